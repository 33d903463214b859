// src/services/user_service.rs

use bcrypt::hash;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserRepository,
    middleware::rbac::ensure_can_grant_role,
    models::auth::{CreateUserPayload, UpdateUserPayload, User, UserRole},
};

#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
}

impl UserService {
    pub fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    pub async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, AppError> {
        self.user_repo.list_users(role).await
    }

    /// Masters ativos, para o seletor de atribuição.
    pub async fn list_masters(&self) -> Result<Vec<User>, AppError> {
        let masters = self.user_repo.list_users(Some(UserRole::Master)).await?;
        Ok(masters.into_iter().filter(|u| u.is_active).collect())
    }

    pub async fn create_user(&self, actor: &User, payload: CreateUserPayload) -> Result<User, AppError> {
        ensure_can_grant_role(actor, payload.role)?;

        if payload.email.is_none() && payload.phone.is_none() {
            return Err(AppError::InvalidInput("Укажите e-mail или телефон".into()));
        }

        let password_hash = match payload.password {
            Some(password) => Some(
                tokio::task::spawn_blocking(move || hash(&password, bcrypt::DEFAULT_COST))
                    .await
                    .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??,
            ),
            None => None,
        };

        let user = self
            .user_repo
            .create_user(
                payload.full_name.trim(),
                payload.email.as_deref(),
                payload.phone.as_deref(),
                password_hash.as_deref(),
                payload.role,
            )
            .await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "👤 Usuário criado");
        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &User,
        id: Uuid,
        payload: UpdateUserPayload,
    ) -> Result<User, AppError> {
        let target = self
            .user_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Пользователь".into()))?;

        // Mexer em um diretor exige ser diretor
        ensure_can_grant_role(actor, target.role)?;
        if let Some(role) = payload.role {
            ensure_can_grant_role(actor, role)?;
        }

        if actor.id == id && payload.is_active == Some(false) {
            return Err(AppError::InvalidInput("Нельзя деактивировать самого себя".into()));
        }

        self.user_repo
            .update_user(id, payload.full_name.as_deref().map(str::trim), payload.role, payload.is_active)
            .await
    }
}
