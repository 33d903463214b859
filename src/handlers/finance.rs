// src/handlers/finance.rs

use axum::{extract::State, response::IntoResponse};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::begin_rls_transaction,
        error::AppError,
        extract::{ValidPath, ValidatedJson, ValidatedQuery},
        response::{ApiResponse, PaginationQuery},
    },
    config::AppState,
    db::finance_repo::PaymentRefs,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{Management, RequireRole},
    },
    models::finance::{
        CreateDebtPayload, CreatePartsSalePayload, CreatePaymentPayload, Debt, DebtQuery,
        PartsSale, PartsSaleQuery, Payment, PaymentQuery, PaymentReceipt,
    },
};

// =============================================================================
//  VENDAS DE PEÇAS
// =============================================================================

// GET /api/parts-sales
#[utoipa::path(
    get,
    path = "/api/parts-sales",
    tag = "Finance",
    params(PaginationQuery, PartsSaleQuery),
    responses((status = 200, description = "Vendas de peças", body = Vec<PartsSale>)),
    security(("api_jwt" = []))
)]
pub async fn list_parts_sales(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(pagination): ValidatedQuery<PaginationQuery>,
    ValidatedQuery(query): ValidatedQuery<PartsSaleQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let page = app_state
        .finance_service
        .list_parts_sales(&mut tx, &user.0, query.client_id, &pagination)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(page))
}

// POST /api/parts-sales
#[utoipa::path(
    post,
    path = "/api/parts-sales",
    tag = "Finance",
    request_body = CreatePartsSalePayload,
    responses(
        (status = 201, description = "Venda registrada", body = PartsSale),
        (status = 400, description = "Itens inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_parts_sale(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<CreatePartsSalePayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let sale = app_state.finance_service.create_parts_sale(&mut *tx, &user.0, &payload).await?;

    tx.commit().await?;
    Ok(ApiResponse::created(sale))
}

// GET /api/parts-sales/{id}
#[utoipa::path(
    get,
    path = "/api/parts-sales/{id}",
    tag = "Finance",
    params(("id" = Uuid, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Venda de peças", body = PartsSale),
        (status = 404, description = "Venda não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_parts_sale(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let sale = app_state.finance_service.get_parts_sale(&mut *tx, &user.0, id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(sale))
}

// =============================================================================
//  DÍVIDAS (somente administração)
// =============================================================================

// GET /api/debts
#[utoipa::path(
    get,
    path = "/api/debts",
    tag = "Finance",
    params(PaginationQuery, DebtQuery),
    responses(
        (status = 200, description = "Dívidas de clientes", body = Vec<Debt>),
        (status = 403, description = "Apenas administração")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_debts(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidatedQuery(pagination): ValidatedQuery<PaginationQuery>,
    ValidatedQuery(query): ValidatedQuery<DebtQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    let page = app_state
        .finance_service
        .list_debts(&mut tx, query.client_id, query.open_only.unwrap_or(false), &pagination)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(page))
}

// POST /api/debts
#[utoipa::path(
    post,
    path = "/api/debts",
    tag = "Finance",
    request_body = CreateDebtPayload,
    responses(
        (status = 201, description = "Dívida registrada", body = Debt),
        (status = 403, description = "Apenas administração")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_debt(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidatedJson(payload): ValidatedJson<CreateDebtPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    let debt = app_state.finance_service.create_debt(&mut *tx, &guard.user.0, &payload).await?;

    tx.commit().await?;
    Ok(ApiResponse::created(debt))
}

// GET /api/debts/{id}
#[utoipa::path(
    get,
    path = "/api/debts/{id}",
    tag = "Finance",
    params(("id" = Uuid, Path, description = "ID da dívida")),
    responses(
        (status = 200, description = "Dívida com saldo restante", body = Debt),
        (status = 404, description = "Dívida não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_debt(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    let debt = app_state.finance_service.get_debt(&mut *tx, id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(debt))
}

// =============================================================================
//  PAGAMENTOS
// =============================================================================

// GET /api/payments
#[utoipa::path(
    get,
    path = "/api/payments",
    tag = "Finance",
    params(PaginationQuery, PaymentQuery),
    responses((status = 200, description = "Pagamentos", body = Vec<Payment>)),
    security(("api_jwt" = []))
)]
pub async fn list_payments(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(pagination): ValidatedQuery<PaginationQuery>,
    ValidatedQuery(query): ValidatedQuery<PaymentQuery>,
) -> Result<impl IntoResponse, AppError> {
    let refs = PaymentRefs {
        order_id: query.order_id,
        parts_sale_id: query.parts_sale_id,
        debt_id: query.debt_id,
    };

    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let page = app_state
        .finance_service
        .list_payments(&mut tx, &user.0, refs, &pagination)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(page))
}

// POST /api/payments
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Finance",
    request_body = CreatePaymentPayload,
    responses(
        (status = 201, description = "Pagamento registrado; dívida abatida quando referenciada", body = PaymentReceipt),
        (status = 400, description = "Sem referência ou valor inválido"),
        (status = 404, description = "Pedido, venda ou dívida não encontrados")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_payment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<CreatePaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let receipt = app_state.finance_service.record_payment(&mut *tx, &user.0, &payload).await?;

    tx.commit().await?;
    Ok(ApiResponse::created(receipt))
}
