use sqlx::{PgConnection, Postgres, Transaction};

use crate::common::error::AppError;
use crate::config::AppState;
use crate::middleware::auth::AuthenticatedUser;

/// Papel sem posse das tabelas: só com ele as políticas RLS valem.
pub(crate) const APP_DB_ROLE: &str = "crm_app";

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Abre uma transação, troca para o papel `crm_app` e define as variáveis
/// lidas pelas políticas RLS (`app.user_id`, `app.user_role`). Tudo é local à
/// transação, então o handler faz o commit no final.
pub(crate) async fn begin_rls_transaction(
    app_state: &AppState,
    user: &AuthenticatedUser,
) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = app_state.db_pool.begin().await?;
    set_rls_context(&mut tx, Some(&user.0.id.to_string()), user.0.role.as_str()).await?;
    Ok(tx)
}

/// Variante usada pelos jobs agendados: sem usuário, papel `system`.
pub(crate) async fn begin_system_transaction(
    pool: &sqlx::PgPool,
) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = pool.begin().await?;
    set_rls_context(&mut tx, None, "system").await?;
    Ok(tx)
}

pub(crate) async fn set_rls_context(
    conn: &mut PgConnection,
    user_id: Option<&str>,
    role: &str,
) -> Result<(), AppError> {
    sqlx::query(&format!("SET LOCAL ROLE {APP_DB_ROLE}"))
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "SELECT set_config('app.user_id', COALESCE($1, ''), true), set_config('app.user_role', $2, true)",
    )
    .bind(user_id)
    .bind(role)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
