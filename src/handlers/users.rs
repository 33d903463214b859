// src/handlers/users.rs

use axum::{extract::State, response::IntoResponse};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        extract::{ValidPath, ValidatedJson, ValidatedQuery},
        response::ApiResponse,
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{Management, RequireRole},
    },
    models::auth::{CreateUserPayload, UpdateUserPayload, User, UserListQuery},
};

// GET /api/users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Usuários da oficina", body = Vec<User>),
        (status = 403, description = "Apenas administração")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_users(
    State(app_state): State<AppState>,
    _guard: RequireRole<Management>,
    ValidatedQuery(query): ValidatedQuery<UserListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let users = app_state.user_service.list_users(query.role).await?;
    Ok(ApiResponse::ok(users))
}

// GET /api/users/masters
#[utoipa::path(
    get,
    path = "/api/users/masters",
    tag = "Users",
    responses((status = 200, description = "Masters ativos", body = Vec<User>)),
    security(("api_jwt" = []))
)]
pub async fn list_masters(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let masters = app_state.user_service.list_masters().await?;
    Ok(ApiResponse::ok(masters))
}

// POST /api/users
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "Usuário criado", body = User),
        (status = 403, description = "Papel não pode ser concedido"),
        (status = 409, description = "E-mail ou telefone já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_user(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidatedJson(payload): ValidatedJson<CreateUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    let user = app_state.user_service.create_user(&guard.user.0, payload).await?;
    Ok(ApiResponse::created(user))
}

// PATCH /api/users/{id}
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    tag = "Users",
    request_body = UpdateUserPayload,
    params(("id" = Uuid, Path, description = "ID do usuário")),
    responses(
        (status = 200, description = "Usuário atualizado", body = User),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_user(
    State(app_state): State<AppState>,
    guard: RequireRole<Management>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    let user = app_state.user_service.update_user(&guard.user.0, id, payload).await?;
    Ok(ApiResponse::ok(user))
}
