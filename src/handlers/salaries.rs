// src/handlers/salaries.rs

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
    models::salaries::{
        Bonus, CreateBonusPayload, RecalculateQuery, Salary, SalaryQuery, WeeklyRecalculation,
        WeeklySalaryTotal,
    },
};

// GET /api/salaries
#[utoipa::path(
    get,
    path = "/api/salaries",
    tag = "Salaries",
    params(PaginationQuery, SalaryQuery),
    responses((status = 200, description = "Salários por pedido (master vê só os próprios)", body = Vec<Salary>)),
    security(("api_jwt" = []))
)]
pub async fn list_salaries(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(pagination): ValidatedQuery<PaginationQuery>,
    ValidatedQuery(query): ValidatedQuery<SalaryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let page = app_state
        .salary_service
        .list_salaries(&mut tx, &user.0, query.master_id, query.week_start, &pagination)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(page))
}

// GET /api/salaries/weekly
#[utoipa::path(
    get,
    path = "/api/salaries/weekly",
    tag = "Salaries",
    params(SalaryQuery),
    responses((status = 200, description = "Totais semanais por master", body = Vec<WeeklySalaryTotal>)),
    security(("api_jwt" = []))
)]
pub async fn list_weekly_totals(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(query): ValidatedQuery<SalaryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let totals = app_state
        .salary_service
        .list_weekly_totals(&mut *tx, &user.0, query.master_id, query.week_start)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(totals))
}

// POST /api/salaries/weekly/recalculate
#[utoipa::path(
    post,
    path = "/api/salaries/weekly/recalculate",
    tag = "Salaries",
    params(RecalculateQuery),
    responses(
        (status = 200, description = "Semana recalculada", body = WeeklyRecalculation),
        (status = 403, description = "Apenas administração")
    ),
    security(("api_jwt" = []))
)]
pub async fn recalculate_week(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidatedQuery(query): ValidatedQuery<RecalculateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let day = query
        .week_start
        .unwrap_or_else(|| app_state.salary_service.current_week_start());

    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    let result = app_state.salary_service.recalculate_week(&mut *tx, day).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(result))
}

// =============================================================================
//  BÔNUS
// =============================================================================

// GET /api/bonuses
#[utoipa::path(
    get,
    path = "/api/bonuses",
    tag = "Salaries",
    params(SalaryQuery),
    responses((status = 200, description = "Bônus (master vê só os próprios)", body = Vec<Bonus>)),
    security(("api_jwt" = []))
)]
pub async fn list_bonuses(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedQuery(query): ValidatedQuery<SalaryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &user).await?;

    let bonuses = app_state
        .salary_service
        .list_bonuses(&mut *tx, &user.0, query.master_id, query.week_start)
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(bonuses))
}

// POST /api/bonuses
#[utoipa::path(
    post,
    path = "/api/bonuses",
    tag = "Salaries",
    request_body = CreateBonusPayload,
    responses(
        (status = 201, description = "Bônus lançado (entra no próximo recálculo da semana)", body = Bonus),
        (status = 403, description = "Apenas administração")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_bonus(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidatedJson(payload): ValidatedJson<CreateBonusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    let bonus = app_state.salary_service.create_bonus(&mut *tx, &guard.user.0, &payload).await?;

    tx.commit().await?;
    Ok(ApiResponse::created(bonus))
}

// DELETE /api/bonuses/{id}
#[utoipa::path(
    delete,
    path = "/api/bonuses/{id}",
    tag = "Salaries",
    params(("id" = Uuid, Path, description = "ID do bônus")),
    responses(
        (status = 200, description = "Bônus removido"),
        (status = 404, description = "Bônus não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_bonus(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    app_state.salary_service.delete_bonus(&mut *tx, id).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(json!({ "id": id, "deleted": true })))
}
