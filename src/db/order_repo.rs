// src/db/order_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::contains_pattern,
    models::orders::{MasterShare, Order, OrderMaster, OrderStatus, ServiceLine},
};

// Pedido + nome do cliente em uma única leitura
const ORDER_SELECT: &str = r#"
    SELECT
        o.id, o.order_number, o.client_id, c.full_name AS client_name,
        o.services, o.parts_cost, o.services_cost, o.total_amount,
        o.status, o.notes, o.created_by, o.completed_at, o.created_at, o.updated_at
    FROM orders o
    LEFT JOIN clients c ON c.id = o.client_id
"#;

const ORDER_FILTER: &str = r#"
    WHERE ($1::order_status IS NULL OR o.status = $1)
      AND ($2::uuid IS NULL OR o.client_id = $2)
      AND ($3::uuid IS NULL OR EXISTS (
              SELECT 1 FROM order_masters om WHERE om.order_id = o.id AND om.master_id = $3))
      AND ($4::text IS NULL
           OR o.order_number ILIKE $4 ESCAPE '\' OR c.full_name ILIKE $4 ESCAPE '\'
           OR c.car_plate ILIKE $4 ESCAPE '\' OR o.notes ILIKE $4 ESCAPE '\')
      AND ($5 OR o.created_by = $6 OR EXISTS (
              SELECT 1 FROM order_masters om WHERE om.order_id = o.id AND om.master_id = $6))
"#;

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
    pub master_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Quem está listando: master só enxerga os próprios pedidos.
#[derive(Debug, Clone, Copy)]
pub struct OrderViewer {
    pub user_id: Uuid,
    pub sees_everything: bool,
}

/// Valores graváveis do pedido (o total é coluna gerada).
#[derive(Debug, Clone)]
pub struct OrderValues<'a> {
    pub client_id: Option<Uuid>,
    pub services: &'a [ServiceLine],
    pub parts_cost: Decimal,
    pub services_cost: Decimal,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct LockedOrder {
    pub status: OrderStatus,
    pub created_by: Option<Uuid>,
}

#[derive(Clone, Default)]
pub struct OrderRepository;

impl OrderRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  NUMERAÇÃO
    // =========================================================================

    /// Próximo número da sequência do prefixo, atômico (trava a linha do
    /// contador). Na primeira vez o contador parte do maior sufixo existente.
    pub async fn allocate_order_number<'e, E>(&self, executor: E, prefix: &str) -> Result<i32, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let next: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO order_counters (prefix, last_value)
            VALUES ($1, app_order_number_floor($1) + 1)
            ON CONFLICT (prefix) DO UPDATE
            SET last_value = order_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(prefix)
        .fetch_one(executor)
        .await?;

        Ok(next)
    }

    // =========================================================================
    //  PEDIDOS
    // =========================================================================

    pub async fn insert_order<'e, E>(
        &self,
        executor: E,
        order_number: &str,
        values: &OrderValues<'_>,
        created_by: Uuid,
    ) -> Result<Uuid, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                order_number, client_id, services, parts_cost, services_cost, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(order_number)
        .bind(values.client_id)
        .bind(Json(values.services))
        .bind(values.parts_cost)
        .bind(values.services_cost)
        .bind(values.notes)
        .bind(created_by)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(format!("Заказ {} уже существует", order_number));
                }
            }
            e.into()
        })?;

        Ok(id)
    }

    pub async fn find_order<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(order)
    }

    /// Existência ignorando RLS: distingue "não existe" de "sem acesso".
    pub async fn order_exists<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar("SELECT app_order_exists($1)")
            .bind(id)
            .fetch_one(executor)
            .await?;

        Ok(exists)
    }

    /// Trava a linha do pedido até o fim da transação (transição de status).
    pub async fn lock_order<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<LockedOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let locked = sqlx::query_as::<_, LockedOrder>(
            "SELECT status, created_by FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(locked)
    }

    /// Sobrescreve os valores editáveis. As linhas de serviço são trocadas
    /// inteiras, junto com o custo derivado delas.
    pub async fn update_order_values<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        values: &OrderValues<'_>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET client_id = $2, services = $3, parts_cost = $4, services_cost = $5,
                notes = $6, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(values.client_id)
        .bind(Json(values.services))
        .bind(values.parts_cost)
        .bind(values.services_cost)
        .bind(values.notes)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ResourceNotFound("Заказ".into()));
        }

        Ok(())
    }

    /// Grava o status; `completed_at` só é preenchido na primeira conclusão.
    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: OrderStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, completed_at = COALESCE(completed_at, $3), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(completed_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn list_orders(
        &self,
        conn: &mut PgConnection,
        filter: &OrderFilter,
        viewer: OrderViewer,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, i64), AppError> {
        let pattern = filter.search.as_deref().map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM orders o LEFT JOIN clients c ON c.id = o.client_id {ORDER_FILTER}"
        ))
        .bind(filter.status)
        .bind(filter.client_id)
        .bind(filter.master_id)
        .bind(pattern.as_deref())
        .bind(viewer.sees_everything)
        .bind(viewer.user_id)
        .fetch_one(&mut *conn)
        .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            "{ORDER_SELECT} {ORDER_FILTER} ORDER BY o.created_at DESC LIMIT $7 OFFSET $8"
        ))
        .bind(filter.status)
        .bind(filter.client_id)
        .bind(filter.master_id)
        .bind(pattern.as_deref())
        .bind(viewer.sees_everything)
        .bind(viewer.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok((orders, total))
    }

    pub async fn delete_order<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ResourceNotFound("Заказ".into()));
        }

        Ok(())
    }

    // =========================================================================
    //  MASTERS ATRIBUÍDOS
    // =========================================================================

    pub async fn list_masters<'e, E>(&self, executor: E, order_id: Uuid) -> Result<Vec<OrderMaster>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let masters = sqlx::query_as::<_, OrderMaster>(
            r#"
            SELECT om.order_id, om.master_id, u.full_name AS master_name, om.percentage
            FROM order_masters om
            JOIN users u ON u.id = om.master_id
            WHERE om.order_id = $1
            ORDER BY om.percentage DESC, u.full_name ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        Ok(masters)
    }

    /// Troca o conjunto inteiro de atribuições do pedido.
    pub async fn replace_masters(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        shares: &[MasterShare],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM order_masters WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *conn)
            .await?;

        if shares.is_empty() {
            return Ok(());
        }

        // Inserção em massa usando UNNEST
        let master_ids: Vec<Uuid> = shares.iter().map(|s| s.master_id).collect();
        let percentages: Vec<Decimal> = shares.iter().map(|s| s.percentage).collect();

        sqlx::query(
            r#"
            INSERT INTO order_masters (order_id, master_id, percentage)
            SELECT $1, m, p FROM UNNEST($2::uuid[], $3::numeric[]) AS t(m, p)
            "#,
        )
        .bind(order_id)
        .bind(&master_ids)
        .bind(&percentages)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{error::ErrorKind, test_support::{create_user, rls_tx}};
    use crate::models::auth::UserRole;
    use sqlx::PgPool;

    fn values(parts_cost: &str, services_cost: &str) -> OrderValues<'static> {
        OrderValues {
            client_id: None,
            services: &[],
            parts_cost: parts_cost.parse().unwrap(),
            services_cost: services_cost.parse().unwrap(),
            notes: Some("Стук 100% в подвеске"),
        }
    }

    #[sqlx::test]
    async fn counter_starts_from_one_on_an_empty_table(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let repo = OrderRepository::new();

        let mut tx = rls_tx(&pool, &admin).await;
        assert_eq!(repo.allocate_order_number(&mut *tx, "ZA").await.unwrap(), 1);
        assert_eq!(repo.allocate_order_number(&mut *tx, "ZA").await.unwrap(), 2);
        // Outro prefixo tem sequência própria
        assert_eq!(repo.allocate_order_number(&mut *tx, "ZB").await.unwrap(), 1);
    }

    #[sqlx::test]
    async fn total_beyond_the_column_is_a_validation_error(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let repo = OrderRepository::new();

        let mut tx = rls_tx(&pool, &admin).await;
        let error = repo
            .insert_order(&mut *tx, "ZA900", &values("9999999999", "9999999999"), admin.id)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[sqlx::test]
    async fn percent_sign_in_search_matches_literally(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let repo = OrderRepository::new();
        let viewer = OrderViewer { user_id: admin.id, sees_everything: true };

        let mut tx = rls_tx(&pool, &admin).await;
        repo.insert_order(&mut *tx, "ZA001", &values("0", "100"), admin.id).await.unwrap();
        let plain = OrderValues { notes: Some("Стук 100 раз"), ..values("0", "100") };
        repo.insert_order(&mut *tx, "ZA002", &plain, admin.id).await.unwrap();

        let filter = OrderFilter { search: Some("100%".into()), ..OrderFilter::default() };
        let (orders, total) = repo.list_orders(&mut tx, &filter, viewer, 20, 0).await.unwrap();

        assert_eq!(total, 1);
        assert_eq!(orders[0].order_number, "ZA001");
    }
}
