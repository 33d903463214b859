// src/handlers/catalog.rs

use axum::{extract::State, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::begin_rls_transaction,
        error::AppError,
        extract::{ValidPath, ValidatedJson, ValidatedQuery},
        money::{ensure_non_negative, round_money},
        response::ApiResponse,
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{Management, RequireRole},
    },
    models::catalog::{CatalogItem, CatalogQuery, CreateCatalogItemPayload, UpdateCatalogItemPayload},
};

// GET /api/services
#[utoipa::path(
    get,
    path = "/api/services",
    tag = "Catalog",
    params(CatalogQuery),
    responses((status = 200, description = "Catálogo de serviços", body = Vec<CatalogItem>)),
    security(("api_jwt" = []))
)]
pub async fn list_services(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(query): ValidatedQuery<CatalogQuery>,
) -> Result<impl IntoResponse, AppError> {
    // Desativados só aparecem para a administração
    let include_inactive = query.include_inactive.unwrap_or(false) && user.0.role.is_management();

    let mut tx = begin_rls_transaction(&app_state, &user).await?;
    let items = app_state.catalog_repo.list(&mut *tx, include_inactive).await?;
    tx.commit().await?;

    Ok(ApiResponse::ok(items))
}

// POST /api/services
#[utoipa::path(
    post,
    path = "/api/services",
    tag = "Catalog",
    request_body = CreateCatalogItemPayload,
    responses(
        (status = 201, description = "Serviço criado", body = CatalogItem),
        (status = 409, description = "Nome já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_service(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidatedJson(payload): ValidatedJson<CreateCatalogItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    ensure_non_negative(payload.default_price, "defaultPrice")?;

    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;
    let item = app_state
        .catalog_repo
        .create(&mut *tx, payload.name.trim(), round_money(payload.default_price))
        .await?;
    tx.commit().await?;

    Ok(ApiResponse::created(item))
}

// PUT /api/services/{id}
#[utoipa::path(
    put,
    path = "/api/services/{id}",
    tag = "Catalog",
    request_body = UpdateCatalogItemPayload,
    params(("id" = Uuid, Path, description = "ID do serviço")),
    responses(
        (status = 200, description = "Serviço atualizado", body = CatalogItem),
        (status = 404, description = "Serviço não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_service(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateCatalogItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(price) = payload.default_price {
        ensure_non_negative(price, "defaultPrice")?;
    }

    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;
    let item = app_state
        .catalog_repo
        .update(
            &mut *tx,
            id,
            payload.name.as_deref().map(str::trim),
            payload.default_price.map(round_money),
            payload.is_active,
        )
        .await?;
    tx.commit().await?;

    Ok(ApiResponse::ok(item))
}

// DELETE /api/services/{id}
#[utoipa::path(
    delete,
    path = "/api/services/{id}",
    tag = "Catalog",
    params(("id" = Uuid, Path, description = "ID do serviço")),
    responses(
        (status = 200, description = "Serviço removido"),
        (status = 404, description = "Serviço não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_service(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;
    app_state.catalog_repo.delete(&mut *tx, id).await?;
    tx.commit().await?;

    Ok(ApiResponse::ok(json!({ "id": id, "deleted": true })))
}
