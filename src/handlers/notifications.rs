// src/handlers/notifications.rs

use axum::{extract::State, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::begin_rls_transaction,
        error::AppError,
        extract::{ValidPath, ValidatedQuery},
        response::{ApiResponse, PaginationQuery},
    },
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::notifications::{Notification, NotificationQuery},
};

// GET /api/notifications
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    params(PaginationQuery, NotificationQuery),
    responses((status = 200, description = "Notificações do usuário", body = Vec<Notification>)),
    security(("api_jwt" = []))
)]
pub async fn list_notifications(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(pagination): ValidatedQuery<PaginationQuery>,
    ValidatedQuery(query): ValidatedQuery<NotificationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let page = app_state
        .notification_service
        .list_for_user(&mut tx, user.0.id, query.unread_only.unwrap_or(false), &pagination)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(page))
}

// PATCH /api/notifications/{id}/read
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "ID da notificação")),
    responses(
        (status = 200, description = "Marcada como lida", body = Notification),
        (status = 404, description = "Notificação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_read(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let notification = app_state.notification_service.mark_read(&mut *tx, id, user.0.id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(notification))
}

// POST /api/notifications/read-all
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "Notifications",
    responses((status = 200, description = "Todas marcadas como lidas")),
    security(("api_jwt" = []))
)]
pub async fn mark_all_read(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let updated = app_state.notification_service.mark_all_read(&mut *tx, user.0.id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(json!({ "updated": updated })))
}
