// src/models/clients.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(example = "Сергей Иванов")]
    pub full_name: String,
    #[schema(example = "+79161234567")]
    pub phone: Option<String>,
    pub email: Option<String>,

    // Dados do carro (um cliente, um carro principal)
    #[schema(example = "Toyota Camry")]
    pub car_model: Option<String>,
    #[schema(example = "А123ВС77")]
    pub car_plate: Option<String>,
    pub car_vin: Option<String>,
    #[schema(example = 2018)]
    pub car_year: Option<i32>,

    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Criação e edição usam o mesmo corpo (PUT substitui tudo)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientPayload {
    #[validate(length(min = 2, max = 200, message = "Укажите имя клиента"))]
    pub full_name: String,
    #[validate(length(min = 5, max = 20, message = "Некорректный номер телефона"))]
    pub phone: Option<String>,
    #[validate(email(message = "Некорректный e-mail"))]
    pub email: Option<String>,
    pub car_model: Option<String>,
    #[validate(length(max = 15, message = "Слишком длинный госномер"))]
    pub car_plate: Option<String>,
    #[validate(length(equal = 17, message = "VIN состоит из 17 символов"))]
    pub car_vin: Option<String>,
    #[validate(range(min = 1900, max = 2100, message = "Некорректный год выпуска"))]
    pub car_year: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClientSearchQuery {
    /// Nome, telefone ou placa
    #[validate(length(max = 100, message = "Слишком длинный запрос"))]
    pub search: Option<String>,
}
