// src/db/user_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{PhoneCode, Session, User, UserRole},
};

const USER_COLUMNS: &str =
    "id, full_name, email, phone, password_hash, role, is_active, created_at, updated_at";

// O repositório de usuários, sessões e códigos de acesso por telefone
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  USUÁRIOS
    // =========================================================================

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = $1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    // Com tratamento de erro específico para e-mail/telefone duplicados.
    pub async fn create_user(
        &self,
        full_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        password_hash: Option<&str>,
        role: UserRole,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (full_name, email, phone, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(full_name)
        .bind(email)
        .bind(phone)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return match db_err.constraint() {
                        Some("users_email_key") => {
                            AppError::Conflict("Этот e-mail уже используется".into())
                        }
                        Some("users_phone_key") => {
                            AppError::Conflict("Этот телефон уже используется".into())
                        }
                        _ => AppError::Conflict("Пользователь уже существует".into()),
                    };
                }
            }
            e.into()
        })
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        role: Option<UserRole>,
        is_active: Option<bool>,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                role = COALESCE($3, role),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(full_name)
        .bind(role)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::ResourceNotFound("Пользователь".into()))?;

        Ok(user)
    }

    pub async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
            ORDER BY full_name ASC
            "#
        ))
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Confere se todos os IDs são masters ativos (atribuição em pedidos).
    pub async fn count_active_masters<'e, E>(&self, executor: E, ids: &[Uuid]) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE id = ANY($1) AND role = 'master' AND is_active",
        )
        .bind(ids)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    // =========================================================================
    //  SESSÕES
    // =========================================================================

    pub async fn create_session(
        &self,
        user_id: Uuid,
        method: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, method, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, method, created_at, expires_at, revoked_at
            "#,
        )
        .bind(user_id)
        .bind(method)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn find_active_session(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, method, created_at, expires_at, revoked_at
            FROM sessions
            WHERE id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn revoke_session(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    //  CÓDIGOS POR TELEFONE
    // =========================================================================

    /// Um código ativo por telefone; pedir outro substitui o anterior.
    pub async fn upsert_phone_code(
        &self,
        phone: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO phone_codes (phone, code_hash, attempts, expires_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (phone) DO UPDATE
            SET code_hash = EXCLUDED.code_hash,
                attempts = 0,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()
            "#,
        )
        .bind(phone)
        .bind(code_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gasta uma tentativa antes de qualquer verificação. Código vencido ou
    /// sem tentativas restantes não volta: pedidos paralelos nunca passam do
    /// limite porque o incremento e o teste acontecem na mesma linha travada.
    pub async fn consume_phone_code_attempt(
        &self,
        phone: &str,
        max_attempts: i32,
    ) -> Result<Option<PhoneCode>, AppError> {
        let code = sqlx::query_as::<_, PhoneCode>(
            r#"
            UPDATE phone_codes
            SET attempts = attempts + 1
            WHERE phone = $1 AND attempts < $2 AND expires_at > NOW()
            RETURNING code_hash, attempts
            "#,
        )
        .bind(phone)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    /// Resgata o código (uso único). `false` se outro pedido já o resgatou
    /// ou se um código novo o substituiu.
    pub async fn redeem_phone_code(&self, phone: &str, code_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM phone_codes WHERE phone = $1 AND code_hash = $2")
            .bind(phone)
            .bind(code_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn delete_phone_code(&self, phone: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM phone_codes WHERE phone = $1")
            .bind(phone)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const PHONE: &str = "+79001234567";

    #[sqlx::test]
    async fn parallel_attempts_never_exceed_the_cap(pool: PgPool) {
        let repo = UserRepository::new(pool);
        repo.upsert_phone_code(PHONE, "hash", Utc::now() + Duration::minutes(5))
            .await
            .unwrap();

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.consume_phone_code_attempt(PHONE, 5).await.unwrap() })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
    }

    #[sqlx::test]
    async fn expired_code_grants_no_attempt(pool: PgPool) {
        let repo = UserRepository::new(pool);
        repo.upsert_phone_code(PHONE, "hash", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        assert!(repo.consume_phone_code_attempt(PHONE, 5).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn code_is_redeemed_only_once(pool: PgPool) {
        let repo = UserRepository::new(pool);
        repo.upsert_phone_code(PHONE, "hash", Utc::now() + Duration::minutes(5))
            .await
            .unwrap();

        assert!(repo.redeem_phone_code(PHONE, "hash").await.unwrap());
        assert!(!repo.redeem_phone_code(PHONE, "hash").await.unwrap());
    }
}
