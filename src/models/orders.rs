// src/models/orders.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::common::{error::AppError, money::amount_too_large};

// --- Enums ---

/// Status do pedido, na ordem do ciclo de vida. Os tokens são os mesmos
/// gravados no tipo `order_status` do Postgres e trafegados no JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status")]
pub enum OrderStatus {
    #[sqlx(rename = "новый")]
    #[serde(rename = "новый")]
    New,
    #[sqlx(rename = "принят")]
    #[serde(rename = "принят")]
    Accepted,
    #[sqlx(rename = "диагностика")]
    #[serde(rename = "диагностика")]
    Diagnostics,
    #[sqlx(rename = "в работе")]
    #[serde(rename = "в работе")]
    InProgress,
    #[sqlx(rename = "ожидание запчастей")]
    #[serde(rename = "ожидание запчастей")]
    AwaitingParts,
    #[sqlx(rename = "готов")]
    #[serde(rename = "готов")]
    Ready,
    #[sqlx(rename = "ожидает оплаты")]
    #[serde(rename = "ожидает оплаты")]
    AwaitingPayment,
    #[sqlx(rename = "выдан")]
    #[serde(rename = "выдан")]
    HandedOver,
    #[sqlx(rename = "закрыт")]
    #[serde(rename = "закрыт")]
    Closed,
}

impl OrderStatus {
    #[cfg(test)]
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::New,
        OrderStatus::Accepted,
        OrderStatus::Diagnostics,
        OrderStatus::InProgress,
        OrderStatus::AwaitingParts,
        OrderStatus::Ready,
        OrderStatus::AwaitingPayment,
        OrderStatus::HandedOver,
        OrderStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "новый",
            OrderStatus::Accepted => "принят",
            OrderStatus::Diagnostics => "диагностика",
            OrderStatus::InProgress => "в работе",
            OrderStatus::AwaitingParts => "ожидание запчастей",
            OrderStatus::Ready => "готов",
            OrderStatus::AwaitingPayment => "ожидает оплаты",
            OrderStatus::HandedOver => "выдан",
            OrderStatus::Closed => "закрыт",
        }
    }

    /// "Выдан" e "закрыт": a partir daqui o salário do master é calculado.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::HandedOver | OrderStatus::Closed)
    }
}

// --- Linhas de valor ---

/// Qualquer linha com preço unitário e quantidade (serviço ou peça).
pub trait PricedLine {
    fn unit_price(&self) -> Decimal;
    fn quantity(&self) -> i32;

    fn line_total(&self) -> Result<Decimal, AppError> {
        self.unit_price()
            .checked_mul(Decimal::from(self.quantity()))
            .ok_or_else(|| amount_too_large("unitPrice"))
    }
}

pub fn sum_line_totals<'a, L, I>(lines: I) -> Result<Decimal, AppError>
where
    L: PricedLine + 'a,
    I: IntoIterator<Item = &'a L>,
{
    lines.into_iter().try_fold(Decimal::ZERO, |acc, line| {
        acc.checked_add(line.line_total()?).ok_or_else(|| amount_too_large("total"))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLine {
    /// Referência opcional ao catálogo; nome e preço ficam copiados na linha.
    pub service_id: Option<Uuid>,

    #[validate(length(min = 1, message = "Укажите название услуги"))]
    #[schema(example = "Замена масла")]
    pub name: String,

    #[schema(example = "1500.00")]
    pub unit_price: Decimal,

    #[validate(range(min = 1, message = "Количество должно быть не меньше 1"))]
    #[schema(example = 1)]
    pub quantity: i32,
}

impl PricedLine for ServiceLine {
    fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    fn quantity(&self) -> i32 {
        self.quantity
    }
}

// --- Pedido ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    #[schema(example = "ZA001")]
    pub order_number: String,
    pub client_id: Option<Uuid>,
    #[schema(example = "Сергей Иванов")]
    pub client_name: Option<String>,
    #[schema(value_type = Vec<ServiceLine>)]
    pub services: Json<Vec<ServiceLine>>,
    #[schema(example = "2500.00")]
    pub parts_cost: Decimal,
    #[schema(example = "1500.00")]
    pub services_cost: Decimal,
    // Coluna gerada no banco: parts_cost + services_cost
    #[schema(example = "4000.00")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderMaster {
    pub order_id: Uuid,
    pub master_id: Uuid,
    #[schema(example = "Алексей Смирнов")]
    pub master_name: String,
    #[schema(example = "60.00")]
    pub percentage: Decimal,
}

/// Atribuição pedida pelo cliente da API.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MasterShare {
    pub master_id: Uuid,
    #[schema(example = "60")]
    pub percentage: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub masters: Vec<OrderMaster>,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
    pub client_id: Option<Uuid>,
    #[serde(default)]
    #[validate(nested)]
    pub services: Vec<ServiceLine>,
    #[serde(default)]
    #[schema(example = "2500.00")]
    pub parts_cost: Decimal,
    #[validate(length(max = 4000, message = "Слишком длинный комментарий"))]
    pub notes: Option<String>,
    #[serde(default)]
    pub masters: Vec<MasterShare>,
}

/// Campos ausentes ficam como estão; `services` e `masters`, quando
/// enviados, substituem a lista inteira.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderPayload {
    pub client_id: Option<Uuid>,
    #[validate(nested)]
    pub services: Option<Vec<ServiceLine>>,
    pub parts_cost: Option<Decimal>,
    #[validate(length(max = 4000, message = "Слишком длинный комментарий"))]
    pub notes: Option<String>,
    pub masters: Option<Vec<MasterShare>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeStatusPayload {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
    pub master_id: Option<Uuid>,
    /// Número, cliente, placa ou observação
    #[validate(length(max = 100, message = "Слишком длинный запрос"))]
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: &str, quantity: i32) -> ServiceLine {
        ServiceLine {
            service_id: None,
            name: "Диагностика".into(),
            unit_price: price.parse().unwrap(),
            quantity,
        }
    }

    #[test]
    fn status_tokens_round_trip_through_json() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
            let back: OrderStatus = serde_json::from_value(json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn unknown_status_token_is_rejected() {
        let parsed = serde_json::from_value::<OrderStatus>(serde_json::json!("archived"));
        assert!(parsed.is_err());
    }

    #[test]
    fn only_handed_over_and_closed_are_terminal() {
        let terminal: Vec<_> = OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![OrderStatus::HandedOver, OrderStatus::Closed]);
    }

    #[test]
    fn services_cost_is_sum_of_line_totals() {
        let lines = vec![line("1500.00", 1), line("250.50", 4)];
        assert_eq!(sum_line_totals(&lines).unwrap(), "2502.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn no_lines_cost_nothing() {
        let lines: Vec<ServiceLine> = vec![];
        assert_eq!(sum_line_totals(&lines).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn overflowing_line_is_an_error_not_a_panic() {
        let body = serde_json::json!({
            "name": "Диагностика",
            "unitPrice": "50000000000000000000000000000",
            "quantity": 2
        });
        let huge: ServiceLine = serde_json::from_value(body).unwrap();
        assert!(matches!(huge.line_total(), Err(AppError::InvalidInput(_))));

        let max = ServiceLine { unit_price: Decimal::MAX, ..line("1", 1) };
        let lines = vec![max.clone(), max];
        assert!(matches!(sum_line_totals(&lines), Err(AppError::InvalidInput(_))));
    }
}
