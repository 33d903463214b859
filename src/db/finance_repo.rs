// src/db/finance_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{types::Json, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::finance::{Debt, PartLine, PartsSale, Payment, PaymentType},
};

const PARTS_SALE_COLUMNS: &str = "id, client_id, items, total_amount, notes, created_by, created_at";

const DEBT_SELECT: &str = r#"
    SELECT
        d.id, d.client_id, c.full_name AS client_name, d.order_id, d.description,
        d.amount, d.remaining, d.due_date, d.created_by, d.created_at, d.updated_at
    FROM debts d
    LEFT JOIN clients c ON c.id = d.client_id
"#;

const PAYMENT_COLUMNS: &str = "id, amount, payment_type, order_id, parts_sale_id, debt_id, \
                               notes, created_by, created_at";

/// Referências de um pagamento (ao menos uma é obrigatória).
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentRefs {
    pub order_id: Option<Uuid>,
    pub parts_sale_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
}

#[derive(Clone, Default)]
pub struct FinanceRepository;

impl FinanceRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  VENDAS DE PEÇAS
    // =========================================================================

    pub async fn create_parts_sale<'e, E>(
        &self,
        executor: E,
        client_id: Option<Uuid>,
        items: &[PartLine],
        total_amount: Decimal,
        notes: Option<&str>,
        created_by: Uuid,
    ) -> Result<PartsSale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, PartsSale>(&format!(
            r#"
            INSERT INTO parts_sales (client_id, items, total_amount, notes, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PARTS_SALE_COLUMNS}
            "#
        ))
        .bind(client_id)
        .bind(Json(items))
        .bind(total_amount)
        .bind(notes)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(sale)
    }

    pub async fn find_parts_sale<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<PartsSale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, PartsSale>(&format!(
            "SELECT {PARTS_SALE_COLUMNS} FROM parts_sales WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(sale)
    }

    /// `created_by` restringe aos registros do próprio master.
    pub async fn list_parts_sales(
        &self,
        conn: &mut PgConnection,
        client_id: Option<Uuid>,
        created_by: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PartsSale>, i64), AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM parts_sales
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR created_by = $2)
            "#,
        )
        .bind(client_id)
        .bind(created_by)
        .fetch_one(&mut *conn)
        .await?;

        let sales = sqlx::query_as::<_, PartsSale>(&format!(
            r#"
            SELECT {PARTS_SALE_COLUMNS} FROM parts_sales
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR created_by = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(client_id)
        .bind(created_by)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok((sales, total))
    }

    // =========================================================================
    //  DÍVIDAS
    // =========================================================================

    pub async fn create_debt<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        order_id: Option<Uuid>,
        description: Option<&str>,
        amount: Decimal,
        due_date: Option<NaiveDate>,
        created_by: Uuid,
    ) -> Result<Uuid, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Dívida nasce com o saldo cheio
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO debts (client_id, order_id, description, amount, remaining, due_date, created_by)
            VALUES ($1, $2, $3, $4, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(client_id)
        .bind(order_id)
        .bind(description)
        .bind(amount)
        .bind(due_date)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(id)
    }

    pub async fn find_debt<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Debt>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let debt = sqlx::query_as::<_, Debt>(&format!("{DEBT_SELECT} WHERE d.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(debt)
    }

    /// Saldo atual com a linha travada até o fim da transação.
    pub async fn lock_debt_remaining<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Decimal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let remaining: Option<Decimal> =
            sqlx::query_scalar("SELECT remaining FROM debts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(executor)
                .await?;

        Ok(remaining)
    }

    pub async fn set_debt_remaining<'e, E>(&self, executor: E, id: Uuid, remaining: Decimal) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE debts SET remaining = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(remaining)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn list_debts(
        &self,
        conn: &mut PgConnection,
        client_id: Option<Uuid>,
        open_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Debt>, i64), AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM debts d
            WHERE ($1::uuid IS NULL OR d.client_id = $1)
              AND (NOT $2 OR d.remaining > 0)
            "#,
        )
        .bind(client_id)
        .bind(open_only)
        .fetch_one(&mut *conn)
        .await?;

        let debts = sqlx::query_as::<_, Debt>(&format!(
            r#"
            {DEBT_SELECT}
            WHERE ($1::uuid IS NULL OR d.client_id = $1)
              AND (NOT $2 OR d.remaining > 0)
            ORDER BY d.due_date ASC NULLS LAST, d.created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(client_id)
        .bind(open_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok((debts, total))
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        amount: Decimal,
        payment_type: PaymentType,
        refs: PaymentRefs,
        notes: Option<&str>,
        created_by: Uuid,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (amount, payment_type, order_id, parts_sale_id, debt_id, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(amount)
        .bind(payment_type)
        .bind(refs.order_id)
        .bind(refs.parts_sale_id)
        .bind(refs.debt_id)
        .bind(notes)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(payment)
    }

    pub async fn list_payments(
        &self,
        conn: &mut PgConnection,
        refs: PaymentRefs,
        created_by: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Payment>, i64), AppError> {
        let filter = r#"
            WHERE ($1::uuid IS NULL OR order_id = $1)
              AND ($2::uuid IS NULL OR parts_sale_id = $2)
              AND ($3::uuid IS NULL OR debt_id = $3)
              AND ($4::uuid IS NULL OR created_by = $4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM payments {filter}"))
            .bind(refs.order_id)
            .bind(refs.parts_sale_id)
            .bind(refs.debt_id)
            .bind(created_by)
            .fetch_one(&mut *conn)
            .await?;

        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments {filter} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(refs.order_id)
        .bind(refs.parts_sale_id)
        .bind(refs.debt_id)
        .bind(created_by)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok((payments, total))
    }
}
