// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    middleware::auth::AuthenticatedUser,
    models::auth::{User, UserRole},
};

/// 1. O Trait que define quais papéis passam pelo portão
pub trait RoleGate: Send + Sync + 'static {
    fn allowed() -> &'static [UserRole];
}

/// 2. O Extractor (Guardião)
pub struct RequireRole<T> {
    pub user: AuthenticatedUser,
    _gate: PhantomData<T>,
}

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleGate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !T::allowed().contains(&user.0.role) {
            return Err(AppError::Forbidden(
                "Недостаточно прав для этого действия".to_string(),
            ));
        }

        Ok(RequireRole { user, _gate: PhantomData })
    }
}

// ---
// DEFINIÇÃO DOS PORTÕES (TIPOS)
// ---

pub struct Management;
impl RoleGate for Management {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::Admin, UserRole::Director]
    }
}

// ---
// Regras de acesso por registro (espelham as políticas RLS)
// ---

/// Master só acessa pedidos que criou ou em que está atribuído.
pub fn can_access_order(user: &User, created_by: Option<Uuid>, assigned_masters: &[Uuid]) -> bool {
    user.role.is_management()
        || created_by == Some(user.id)
        || assigned_masters.contains(&user.id)
}

pub fn ensure_order_access(
    user: &User,
    created_by: Option<Uuid>,
    assigned_masters: &[Uuid],
) -> Result<(), AppError> {
    if can_access_order(user, created_by, assigned_masters) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Нет доступа к этому заказу".to_string()))
    }
}

/// Registros "de autoria" (clientes, pagamentos, vendas de peças).
pub fn ensure_owner_or_management(user: &User, created_by: Option<Uuid>) -> Result<(), AppError> {
    if user.role.is_management() || created_by == Some(user.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Нет доступа к этой записи".to_string()))
    }
}

/// Somente o diretor cria ou promove outro diretor.
pub fn ensure_can_grant_role(actor: &User, target: UserRole) -> Result<(), AppError> {
    let allowed = match target {
        UserRole::Director => actor.role == UserRole::Director,
        UserRole::Admin | UserRole::Master => actor.role.is_management(),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden("Недостаточно прав для назначения этой роли".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            full_name: "Тест".into(),
            email: None,
            phone: Some("+79000000000".into()),
            password_hash: None,
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn master_cannot_access_foreign_order() {
        let master = user(UserRole::Master);
        let other = Uuid::new_v4();

        assert!(!can_access_order(&master, Some(other), &[other]));
        let err = ensure_order_access(&master, Some(other), &[]).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn master_accesses_assigned_or_created_orders() {
        let master = user(UserRole::Master);
        assert!(can_access_order(&master, Some(master.id), &[]));
        assert!(can_access_order(&master, None, &[Uuid::new_v4(), master.id]));
    }

    #[test]
    fn management_accesses_everything() {
        for role in [UserRole::Admin, UserRole::Director] {
            assert!(can_access_order(&user(role), None, &[]));
            assert!(ensure_owner_or_management(&user(role), Some(Uuid::new_v4())).is_ok());
        }
    }

    #[test]
    fn only_director_grants_director() {
        let admin = user(UserRole::Admin);
        let director = user(UserRole::Director);
        let master = user(UserRole::Master);

        assert!(ensure_can_grant_role(&admin, UserRole::Director).is_err());
        assert!(ensure_can_grant_role(&admin, UserRole::Master).is_ok());
        assert!(ensure_can_grant_role(&director, UserRole::Director).is_ok());
        assert!(ensure_can_grant_role(&master, UserRole::Master).is_err());
    }
}
