// src/models/finance.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::orders::PricedLine;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_type")]
pub enum PaymentType {
    #[sqlx(rename = "наличные")]
    #[serde(rename = "наличные")]
    Cash,
    #[sqlx(rename = "карта")]
    #[serde(rename = "карта")]
    Card,
    #[sqlx(rename = "перевод")]
    #[serde(rename = "перевод")]
    Transfer,
    #[sqlx(rename = "смешанный")]
    #[serde(rename = "смешанный")]
    Mixed,
}

// --- Venda de peças (sem pedido de reparo) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartLine {
    #[validate(length(min = 1, message = "Укажите название запчасти"))]
    #[schema(example = "Масляный фильтр")]
    pub name: String,

    #[schema(example = "650.00")]
    pub unit_price: Decimal,

    #[validate(range(min = 1, message = "Количество должно быть не меньше 1"))]
    #[schema(example = 2)]
    pub quantity: i32,
}

impl PricedLine for PartLine {
    fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    fn quantity(&self) -> i32 {
        self.quantity
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartsSale {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    #[schema(value_type = Vec<PartLine>)]
    pub items: Json<Vec<PartLine>>,
    #[schema(example = "1300.00")]
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// --- Dívidas ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: Uuid,
    pub client_id: Uuid,
    pub client_name: Option<String>,
    pub order_id: Option<Uuid>,
    pub description: Option<String>,
    #[schema(example = "5000.00")]
    pub amount: Decimal,
    // Quanto falta pagar; nunca negativo
    #[schema(example = "1500.00")]
    pub remaining: Decimal,
    #[schema(value_type = Option<String>, format = Date, example = "2025-04-30")]
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Pagamentos ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    #[schema(example = "3500.00")]
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub order_id: Option<Uuid>,
    pub parts_sale_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Resultado do registro: o pagamento e, se houver, a dívida já abatida.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub debt: Option<Debt>,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartsSalePayload {
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Добавьте хотя бы одну позицию"), nested)]
    pub items: Vec<PartLine>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDebtPayload {
    pub client_id: Uuid,
    pub order_id: Option<Uuid>,
    #[validate(length(max = 1000, message = "Слишком длинное описание"))]
    pub description: Option<String>,
    #[schema(example = "5000.00")]
    pub amount: Decimal,
    #[schema(value_type = Option<String>, format = Date)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentPayload {
    #[schema(example = "3500.00")]
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub order_id: Option<Uuid>,
    pub parts_sale_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct PartsSaleQuery {
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct DebtQuery {
    pub client_id: Option<Uuid>,
    /// Somente com saldo em aberto
    pub open_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct PaymentQuery {
    pub order_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
    pub parts_sale_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_type_uses_russian_tokens() {
        assert_eq!(serde_json::to_value(PaymentType::Cash).unwrap(), "наличные");
        let parsed: PaymentType = serde_json::from_value(serde_json::json!("перевод")).unwrap();
        assert_eq!(parsed, PaymentType::Transfer);
        assert!(serde_json::from_value::<PaymentType>(serde_json::json!("crypto")).is_err());
    }

    #[test]
    fn part_line_total_multiplies_quantity() {
        let line = PartLine { name: "Свеча".into(), unit_price: "420.50".parse().unwrap(), quantity: 4 };
        assert_eq!(line.line_total().unwrap(), "1682.00".parse::<Decimal>().unwrap());
    }
}
