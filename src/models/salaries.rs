// src/models/salaries.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Parte do master em um pedido concluído. Uma linha por (master, pedido).
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub id: Uuid,
    pub master_id: Uuid,
    pub master_name: Option<String>,
    pub order_id: Uuid,
    pub order_number: Option<String>,
    #[schema(example = "600.00")]
    pub amount: Decimal,
    #[schema(example = "60.00")]
    pub percentage: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-03-03")]
    pub week_start: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Consolidado semanal recalculado pelo job (relatório, não o razão).
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySalaryTotal {
    pub master_id: Uuid,
    pub master_name: Option<String>,
    #[schema(value_type = String, format = Date, example = "2025-03-03")]
    pub week_start: NaiveDate,
    pub commission_amount: Decimal,
    pub orders_count: i32,
    pub bonuses_amount: Decimal,
    pub total_amount: Decimal,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bonus {
    pub id: Uuid,
    pub master_id: Uuid,
    pub master_name: Option<String>,
    // Negativo = desconto
    #[schema(example = "1000.00")]
    pub amount: Decimal,
    #[schema(example = "Премия за качество")]
    pub reason: String,
    #[schema(value_type = String, format = Date, example = "2025-03-03")]
    pub week_start: NaiveDate,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Linha agregada do cálculo semanal, antes do upsert.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct WeeklyCommission {
    pub master_id: Uuid,
    pub commission_amount: Decimal,
    pub orders_count: i64,
    pub bonuses_amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRecalculation {
    #[schema(value_type = String, format = Date)]
    pub week_start: NaiveDate,
    pub masters_updated: usize,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBonusPayload {
    pub master_id: Uuid,
    #[schema(example = "1000.00")]
    pub amount: Decimal,
    #[validate(length(min = 2, max = 500, message = "Укажите причину"))]
    pub reason: String,
    /// Padrão: semana corrente
    #[schema(value_type = Option<String>, format = Date)]
    pub week_start: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct SalaryQuery {
    pub master_id: Option<Uuid>,
    #[param(value_type = Option<String>, format = Date)]
    pub week_start: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct RecalculateQuery {
    /// Qualquer dia da semana desejada; padrão: semana corrente
    #[param(value_type = Option<String>, format = Date)]
    pub week_start: Option<NaiveDate>,
}
