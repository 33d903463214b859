// src/common/error.rs

use std::collections::HashMap;
use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

// Em produção o detalhe interno (cadeia de erros) nunca sai na resposta.
static EXPOSE_DETAILS: OnceLock<bool> = OnceLock::new();

pub fn set_expose_internal_details(expose: bool) {
    let _ = EXPOSE_DETAILS.set(expose);
}

fn expose_internal_details() -> bool {
    *EXPOSE_DETAILS.get().unwrap_or(&false)
}

/// Categorias fixas de erro. Cada uma tem um status HTTP e um código estável
/// que o frontend usa para decidir o que mostrar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Authentication => "UNAUTHORIZED",
            ErrorKind::Authorization => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Ошибка валидации")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Неверный логин или пароль")]
    InvalidCredentials,

    #[error("Недействительный или отсутствующий токен")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} не найден")]
    ResourceNotFound(String),

    #[error("{0}")]
    Conflict(String),

    // Variante para erros de banco de dados
    #[error("Ошибка базы данных: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Внутренняя ошибка сервера: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Ошибка bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Ошибка JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Ошибка внешнего сервиса: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => ErrorKind::Validation,
            AppError::InvalidCredentials | AppError::InvalidToken => ErrorKind::Authentication,
            AppError::Forbidden(_) => ErrorKind::Authorization,
            AppError::ResourceNotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::DatabaseError(e) => classify_sqlx_error(e),
            _ => ErrorKind::Internal,
        }
    }

    /// Mensagem segura para o cliente (nunca vaza SQL nem segredos).
    fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => match classify_sqlx_error(e) {
                ErrorKind::NotFound => "Запись не найдена".to_string(),
                ErrorKind::Conflict => "Запись с такими данными уже существует".to_string(),
                ErrorKind::Validation => "Данные нарушают ограничения базы".to_string(),
                _ => "Произошла непредвиденная ошибка".to_string(),
            },
            AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_)
            | AppError::HttpClientError(_) => "Произошла непредвиденная ошибка".to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::ValidationError(errors) => {
                let mut details: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            AppError::DatabaseError(sqlx::Error::Database(db_err)) => {
                // O nome da constraint ajuda o frontend a apontar o campo
                db_err.constraint().map(|c| json!({ "constraint": c }))
            }
            e if e.kind() == ErrorKind::Internal && expose_internal_details() => {
                Some(json!({ "debug": format!("{:?}", e) }))
            }
            _ => None,
        }
    }
}

// SQLSTATE de valores que não cabem na coluna (NUMERIC estourado, texto longo demais)
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

fn kind_for_sqlstate(code: &str) -> Option<ErrorKind> {
    match code {
        NUMERIC_VALUE_OUT_OF_RANGE | STRING_DATA_RIGHT_TRUNCATION => Some(ErrorKind::Validation),
        _ => None,
    }
}

fn classify_sqlx_error(error: &sqlx::Error) -> ErrorKind {
    match error {
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        sqlx::Error::Database(db_err) => {
            if let Some(kind) = db_err.code().as_deref().and_then(kind_for_sqlstate) {
                return kind;
            }
            classify_db_kind(db_err.kind())
        }
        _ => ErrorKind::Internal,
    }
}

fn classify_db_kind(kind: sqlx::error::ErrorKind) -> ErrorKind {
    match kind {
        sqlx::error::ErrorKind::UniqueViolation => ErrorKind::Conflict,
        sqlx::error::ErrorKind::ForeignKeyViolation
        | sqlx::error::ErrorKind::CheckViolation
        | sqlx::error::ErrorKind::NotNullViolation => ErrorKind::Validation,
        _ => ErrorKind::Internal,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        if kind == ErrorKind::Internal {
            tracing::error!(error = ?self, "Erro interno do servidor");
        }

        let mut error = json!({
            "code": kind.code(),
            "message": self.public_message(),
        });
        if let Some(details) = self.details() {
            error["details"] = details;
        }

        let body = Json(json!({ "success": false, "error": error }));
        (kind.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn each_category_maps_to_fixed_status_and_code() {
        let cases = [
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (AppError::InvalidToken, StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::ResourceNotFound("Заказ".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                AppError::InternalServerError(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.kind().status(), status);
            assert_eq!(error.kind().code(), code);
        }
    }

    #[test]
    fn row_not_found_is_a_not_found_error() {
        let error = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn out_of_range_values_are_validation_errors() {
        assert_eq!(kind_for_sqlstate("22003"), Some(ErrorKind::Validation));
        assert_eq!(kind_for_sqlstate("22001"), Some(ErrorKind::Validation));
        assert_eq!(kind_for_sqlstate("40001"), None);
        assert_eq!(classify_db_kind(sqlx::error::ErrorKind::UniqueViolation), ErrorKind::Conflict);
        assert_eq!(classify_db_kind(sqlx::error::ErrorKind::Other), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn response_uses_the_failure_envelope() {
        let response = AppError::ResourceNotFound("Заказ".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Заказ не найден");
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause_in_the_message() {
        let response =
            AppError::InternalServerError(anyhow::anyhow!("connection refused")).into_response();
        let body = body_json(response).await;

        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(!body["error"]["message"].as_str().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn field_errors_are_listed_in_details() {
        let mut errors = validator::ValidationErrors::new();
        let mut err = validator::ValidationError::new("range");
        err.message = Some("Сумма должна быть больше нуля".into());
        errors.add("amount", err);

        let body = body_json(AppError::from(errors).into_response()).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["amount"][0], "Сумма должна быть больше нуля");
    }
}
