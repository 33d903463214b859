// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Item do catálogo de serviços da oficina (preço de referência).
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: Uuid,
    #[schema(example = "Замена тормозных колодок")]
    pub name: String,
    #[schema(example = "2000.00")]
    pub default_price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCatalogItemPayload {
    #[validate(length(min = 2, max = 200, message = "Укажите название услуги"))]
    pub name: String,
    #[schema(example = "2000.00")]
    pub default_price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCatalogItemPayload {
    #[validate(length(min = 2, max = 200, message = "Укажите название услуги"))]
    pub name: Option<String>,
    pub default_price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct CatalogQuery {
    /// Inclui serviços desativados
    pub include_inactive: Option<bool>,
}
