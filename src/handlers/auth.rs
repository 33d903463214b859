// src/handlers/auth.rs

use axum::{extract::State, response::IntoResponse};
use serde_json::json;

use crate::{
    common::{error::AppError, extract::ValidatedJson, response::ApiResponse},
    config::AppState,
    middleware::auth::{AuthenticatedUser, CurrentSession},
    models::auth::{
        AuthResponse, LoginUserPayload, OAuthLoginPayload, PhoneCodeRequestPayload,
        PhoneCodeVerifyPayload, User,
    },
};

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 200, description = "Login efetuado", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    let auth = app_state.auth_service.login_user(&payload.email, &payload.password).await?;
    Ok(ApiResponse::ok(auth))
}

// POST /api/auth/oauth
#[utoipa::path(
    post,
    path = "/api/auth/oauth",
    tag = "Auth",
    request_body = OAuthLoginPayload,
    responses(
        (status = 200, description = "Login via provedor OAuth", body = AuthResponse),
        (status = 400, description = "OAuth não configurado"),
        (status = 401, description = "Token recusado ou usuário desconhecido")
    )
)]
pub async fn oauth_login(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<OAuthLoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    let auth = app_state.auth_service.login_oauth(&payload.access_token).await?;
    Ok(ApiResponse::ok(auth))
}

// POST /api/auth/phone/request
#[utoipa::path(
    post,
    path = "/api/auth/phone/request",
    tag = "Auth",
    request_body = PhoneCodeRequestPayload,
    responses((status = 200, description = "Código enviado (se o telefone existir)"))
)]
pub async fn request_phone_code(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<PhoneCodeRequestPayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state.auth_service.request_phone_code(payload.phone.trim()).await?;
    Ok(ApiResponse::ok(json!({ "sent": true })))
}

// POST /api/auth/phone/verify
#[utoipa::path(
    post,
    path = "/api/auth/phone/verify",
    tag = "Auth",
    request_body = PhoneCodeVerifyPayload,
    responses(
        (status = 200, description = "Login por código", body = AuthResponse),
        (status = 401, description = "Código inválido, expirado ou esgotado")
    )
)]
pub async fn verify_phone_code(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<PhoneCodeVerifyPayload>,
) -> Result<impl IntoResponse, AppError> {
    let auth = app_state
        .auth_service
        .verify_phone_code(payload.phone.trim(), payload.code.trim())
        .await?;
    Ok(ApiResponse::ok(auth))
}

// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Sessão encerrada")),
    security(("api_jwt" = []))
)]
pub async fn logout(
    State(app_state): State<AppState>,
    CurrentSession(session_id): CurrentSession,
) -> Result<impl IntoResponse, AppError> {
    app_state.auth_service.logout(session_id).await?;
    Ok(ApiResponse::ok(json!({ "loggedOut": true })))
}

// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Usuário autenticado", body = User)),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> ApiResponse<User> {
    ApiResponse::ok(user)
}
