// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// Mapeia o CREATE TYPE user_role do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Master,
    Admin,
    Director,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Master => "master",
            UserRole::Admin => "admin",
            UserRole::Director => "director",
        }
    }

    /// Administração e dono enxergam tudo.
    pub fn is_management(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Director)
    }
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "Иван Петров")]
    pub full_name: String,
    #[schema(example = "ivan@autoservice.ru")]
    pub email: Option<String>,
    #[schema(example = "+79001234567")]
    pub phone: Option<String>,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: Option<String>,

    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub method: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Código ativo já com a tentativa atual contada.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PhoneCode {
    pub code_hash: String,
    pub attempts: i32,
}

// Dados para login por senha
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(message = "Некорректный e-mail"))]
    #[schema(example = "admin@autoservice.ru")]
    pub email: String,
    #[validate(length(min = 6, message = "Пароль должен быть не короче 6 символов"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OAuthLoginPayload {
    #[validate(length(min = 1, message = "required"))]
    pub access_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PhoneCodeRequestPayload {
    #[validate(length(min = 10, max = 16, message = "Некорректный номер телефона"))]
    #[schema(example = "+79001234567")]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PhoneCodeVerifyPayload {
    #[validate(length(min = 10, max = 16, message = "Некорректный номер телефона"))]
    pub phone: String,
    #[validate(length(equal = 6, message = "Код состоит из 6 цифр"))]
    #[schema(example = "123456")]
    pub code: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // ID do usuário
    pub sid: Uuid,   // ID da sessão emitida
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(length(min = 2, message = "Укажите имя"))]
    pub full_name: String,
    #[validate(email(message = "Некорректный e-mail"))]
    pub email: Option<String>,
    #[validate(length(min = 10, max = 16, message = "Некорректный номер телефона"))]
    pub phone: Option<String>,
    #[validate(length(min = 6, message = "Пароль должен быть не короче 6 символов"))]
    pub password: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[validate(length(min = 2, message = "Укажите имя"))]
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_use_lowercase_tokens() {
        assert_eq!(serde_json::to_value(UserRole::Director).unwrap(), "director");
        let role: UserRole = serde_json::from_value(serde_json::json!("master")).unwrap();
        assert_eq!(role, UserRole::Master);
        assert_eq!(UserRole::Admin.as_str(), "admin");
    }

    #[test]
    fn only_admin_and_director_are_management() {
        assert!(!UserRole::Master.is_management());
        assert!(UserRole::Admin.is_management());
        assert!(UserRole::Director.is_management());
    }
}
