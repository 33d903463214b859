// src/handlers/system.rs

use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{common::response::ApiResponse, config::AppState};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    #[schema(example = "ok")]
    pub status: &'static str,
    pub uptime_seconds: u64,
    #[schema(example = "development")]
    pub environment: String,
    #[schema(example = "0.1.0")]
    pub version: &'static str,
}

// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "System",
    responses((status = 200, description = "Serviço no ar", body = HealthStatus))
)]
pub async fn health(State(app_state): State<AppState>) -> ApiResponse<HealthStatus> {
    ApiResponse::ok(HealthStatus {
        status: "ok",
        uptime_seconds: app_state.started_at.elapsed().as_secs(),
        environment: app_state.config.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
