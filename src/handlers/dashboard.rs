// src/handlers/dashboard.rs

use axum::{extract::State, response::IntoResponse};

use crate::{
    common::{
        db_utils::begin_rls_transaction,
        error::AppError,
        extract::ValidatedQuery,
        response::ApiResponse,
    },
    config::AppState,
    middleware::rbac::{Management, RequireRole},
    models::dashboard::{DashboardSummary, SnapshotQuery, StatisticsSnapshot},
};

const DEFAULT_SNAPSHOT_DAYS: i64 = 30;

// GET /api/dashboard/summary
#[utoipa::path(
    get,
    path = "/api/dashboard/summary",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Resumo operacional e financeiro", body = DashboardSummary),
        (status = 401, description = "Não autorizado"),
        (status = 403, description = "Apenas administração")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_summary(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    let summary = app_state.dashboard_service.get_summary(&mut *tx).await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(summary))
}

// GET /api/dashboard/snapshots
#[utoipa::path(
    get,
    path = "/api/dashboard/snapshots",
    tag = "Dashboard",
    params(SnapshotQuery),
    responses(
        (status = 200, description = "Snapshots diários de estatísticas", body = Vec<StatisticsSnapshot>),
        (status = 403, description = "Apenas administração")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_snapshots(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidatedQuery(query): ValidatedQuery<SnapshotQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_rls_transaction(&app_state, &guard.user).await?;

    let snapshots = app_state
        .dashboard_service
        .list_snapshots(&mut *tx, query.days.unwrap_or(DEFAULT_SNAPSHOT_DAYS))
        .await?;

    tx.commit().await?;
    Ok(ApiResponse::ok(snapshots))
}
