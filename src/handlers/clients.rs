// src/handlers/clients.rs

use axum::{extract::State, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::begin_rls_transaction,
        error::AppError,
        extract::{ValidPath, ValidatedJson, ValidatedQuery},
        response::{ApiResponse, PaginationQuery},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{Management, RequireRole},
    },
    models::clients::{Client, ClientPayload, ClientSearchQuery},
};

// GET /api/clients
#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    params(PaginationQuery, ClientSearchQuery),
    responses((status = 200, description = "Clientes paginados", body = Vec<Client>)),
    security(("api_jwt" = []))
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(pagination): ValidatedQuery<PaginationQuery>,
    ValidatedQuery(filter): ValidatedQuery<ClientSearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let page = app_state
        .client_service
        .list_clients(&mut tx, filter.search.as_deref(), &pagination)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(page))
}

// POST /api/clients
#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "Clients",
    request_body = ClientPayload,
    responses(
        (status = 201, description = "Cliente criado", body = Client),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_client(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<ClientPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let client = app_state.client_service.create_client(&mut *tx, &user.0, &payload).await?;

    tx.commit().await?;
    Ok(ApiResponse::created(client))
}

// GET /api/clients/{id}
#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente", body = Client),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let client = app_state.client_service.get_client(&mut *tx, id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(client))
}

// PUT /api/clients/{id}
#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    tag = "Clients",
    request_body = ClientPayload,
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente atualizado", body = Client),
        (status = 403, description = "Master só edita os clientes que criou"),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_client(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<ClientPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let client = app_state.client_service.update_client(&mut tx, &user.0, id, &payload).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(client))
}

// DELETE /api/clients/{id}
#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente removido"),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_client(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    app_state.client_service.delete_client(&mut *tx, id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(json!({ "id": id, "deleted": true })))
}
