// src/models/dashboard.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::orders::OrderStatus;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

// Os cards do topo
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub orders_by_status: Vec<StatusCount>,
    pub orders_total: i64,
    pub orders_open: i64,
    pub orders_completed_week: i64,
    pub revenue_week: Decimal,        // Pedidos concluídos na semana
    pub revenue_month: Decimal,       // Pedidos concluídos no mês
    pub parts_revenue_month: Decimal, // Vendas de peças no mês
    pub payments_today: Decimal,
    pub debts_outstanding: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    #[schema(value_type = String, format = Date)]
    pub snapshot_date: NaiveDate,
    pub orders_total: i64,
    pub orders_open: i64,
    pub orders_completed_week: i64,
    pub revenue_week: Decimal,
    pub revenue_month: Decimal,
    pub parts_revenue_month: Decimal,
    pub payments_today: Decimal,
    pub debts_outstanding: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SnapshotQuery {
    /// Quantos dias para trás (padrão 30)
    #[validate(range(min = 1, max = 366, message = "От 1 до 366 дней"))]
    pub days: Option<i64>,
}
