// src/handlers/orders.rs

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
    db::order_repo::OrderFilter,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{Management, RequireRole},
    },
    models::orders::{
        ChangeStatusPayload, CreateOrderPayload, Order, OrderDetail, OrderListQuery,
        UpdateOrderPayload,
    },
};

impl From<OrderListQuery> for OrderFilter {
    fn from(query: OrderListQuery) -> Self {
        Self {
            status: query.status,
            client_id: query.client_id,
            master_id: query.master_id,
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

// GET /api/orders
#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "Orders",
    params(PaginationQuery, OrderListQuery),
    responses((status = 200, description = "Pedidos visíveis ao usuário", body = Vec<Order>)),
    security(("api_jwt" = []))
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(pagination): ValidatedQuery<PaginationQuery>,
    ValidatedQuery(query): ValidatedQuery<OrderListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = OrderFilter::from(query);
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let page = app_state
        .order_service
        .list_orders(&mut tx, &user.0, &filter, &pagination)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(page))
}

// POST /api/orders
#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "Orders",
    request_body = CreateOrderPayload,
    responses(
        (status = 201, description = "Pedido criado com número sequencial", body = OrderDetail),
        (status = 400, description = "Percentuais não somam 100 ou valores negativos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_order(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<CreateOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let order = app_state.order_service.create_order(&mut *tx, &user.0, &payload).await?;

    tx.commit().await?;
    Ok(ApiResponse::created(order))
}

// GET /api/orders/{id}
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "Orders",
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Pedido com masters atribuídos", body = OrderDetail),
        (status = 403, description = "Pedido de outro master"),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let order = app_state.order_service.get_order(&mut tx, &user.0, id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(order))
}

// PUT /api/orders/{id}
#[utoipa::path(
    put,
    path = "/api/orders/{id}",
    tag = "Orders",
    request_body = UpdateOrderPayload,
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Pedido atualizado", body = OrderDetail),
        (status = 403, description = "Pedido de outro master"),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_order(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let order = app_state.order_service.update_order(&mut *tx, &user.0, id, &payload).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(order))
}

// PATCH /api/orders/{id}/status
#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    tag = "Orders",
    request_body = ChangeStatusPayload,
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Status alterado; salários gerados ao entrar em выдан/закрыт", body = OrderDetail),
        (status = 403, description = "Pedido de outro master"),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_status(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<ChangeStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let order = app_state
        .order_service
        .change_status(&mut *tx, &user.0, id, payload.status)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(order))
}

// DELETE /api/orders/{id}
#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    tag = "Orders",
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Pedido removido"),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_order(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    app_state.order_service.delete_order(&mut *tx, id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(json!({ "id": id, "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_search_is_dropped_from_filter() {
        let query = OrderListQuery { search: Some("   ".into()), ..Default::default() };
        assert_eq!(OrderFilter::from(query).search, None);
    }

    #[test]
    fn search_is_trimmed() {
        let query = OrderListQuery { search: Some(" ZA001 ".into()), ..Default::default() };
        assert_eq!(OrderFilter::from(query).search.as_deref(), Some("ZA001"));
    }
}
