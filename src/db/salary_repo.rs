// src/db/salary_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::salaries::{Bonus, Salary, WeeklyCommission, WeeklySalaryTotal},
};

const BONUS_SELECT: &str = r#"
    SELECT b.id, b.master_id, u.full_name AS master_name, b.amount, b.reason,
           b.week_start, b.created_by, b.created_at
    FROM bonuses b
    LEFT JOIN users u ON u.id = b.master_id
"#;

/// Parte já calculada de um master, pronta para gravar.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryShare {
    pub master_id: Uuid,
    pub amount: Decimal,
    pub percentage: Decimal,
}

#[derive(Clone, Default)]
pub struct SalaryRepository;

impl SalaryRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  SALÁRIOS POR PEDIDO
    // =========================================================================

    /// Grava as partes do pedido. Linhas já existentes para (master, pedido)
    /// ficam como estão; retorna quantas foram de fato inseridas.
    pub async fn insert_salaries<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        week_start: NaiveDate,
        shares: &[SalaryShare],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if shares.is_empty() {
            return Ok(0);
        }

        let master_ids: Vec<Uuid> = shares.iter().map(|s| s.master_id).collect();
        let amounts: Vec<Decimal> = shares.iter().map(|s| s.amount).collect();
        let percentages: Vec<Decimal> = shares.iter().map(|s| s.percentage).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO salaries (master_id, order_id, amount, percentage, week_start)
            SELECT m, $1, a, p, $2
            FROM UNNEST($3::uuid[], $4::numeric[], $5::numeric[]) AS t(m, a, p)
            ON CONFLICT (master_id, order_id) DO NOTHING
            "#,
        )
        .bind(order_id)
        .bind(week_start)
        .bind(&master_ids)
        .bind(&amounts)
        .bind(&percentages)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lock consultivo da semana, preso até o fim da transação.
    pub async fn lock_week_recalculation<'e, E>(&self, executor: E, week_start: NaiveDate) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('weekly_salary_totals'), ($1::date - DATE '2000-01-03')::int)")
            .bind(week_start)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn list_salaries(
        &self,
        conn: &mut PgConnection,
        master_id: Option<Uuid>,
        week_start: Option<NaiveDate>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Salary>, i64), AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM salaries s
            WHERE ($1::uuid IS NULL OR s.master_id = $1)
              AND ($2::date IS NULL OR s.week_start = $2)
            "#,
        )
        .bind(master_id)
        .bind(week_start)
        .fetch_one(&mut *conn)
        .await?;

        let salaries = sqlx::query_as::<_, Salary>(
            r#"
            SELECT s.id, s.master_id, u.full_name AS master_name, s.order_id,
                   o.order_number, s.amount, s.percentage, s.week_start, s.created_at
            FROM salaries s
            LEFT JOIN users u ON u.id = s.master_id
            LEFT JOIN orders o ON o.id = s.order_id
            WHERE ($1::uuid IS NULL OR s.master_id = $1)
              AND ($2::date IS NULL OR s.week_start = $2)
            ORDER BY s.week_start DESC, s.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(master_id)
        .bind(week_start)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok((salaries, total))
    }

    // =========================================================================
    //  TOTAIS SEMANAIS
    // =========================================================================

    /// Comissões dos pedidos concluídos em [from, to) somadas aos bônus da
    /// semana, por master.
    pub async fn weekly_commissions<'e, E>(
        &self,
        executor: E,
        week_start: NaiveDate,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WeeklyCommission>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, WeeklyCommission>(
            r#"
            WITH commissions AS (
                SELECT om.master_id,
                       SUM(ROUND(o.total_amount * om.percentage / 100, 2)) AS commission_amount,
                       COUNT(DISTINCT o.id) AS orders_count
                FROM orders o
                JOIN order_masters om ON om.order_id = o.id
                WHERE o.status IN ('выдан', 'закрыт')
                  AND o.completed_at >= $2 AND o.completed_at < $3
                GROUP BY om.master_id
            ),
            week_bonuses AS (
                SELECT master_id, SUM(amount) AS bonuses_amount
                FROM bonuses
                WHERE week_start = $1
                GROUP BY master_id
            )
            SELECT COALESCE(c.master_id, b.master_id) AS master_id,
                   COALESCE(c.commission_amount, 0) AS commission_amount,
                   COALESCE(c.orders_count, 0) AS orders_count,
                   COALESCE(b.bonuses_amount, 0) AS bonuses_amount
            FROM commissions c
            FULL OUTER JOIN week_bonuses b ON b.master_id = c.master_id
            "#,
        )
        .bind(week_start)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Recalcula, não incrementa: rodar de novo converge no mesmo valor.
    pub async fn upsert_weekly_total<'e, E>(
        &self,
        executor: E,
        week_start: NaiveDate,
        row: &WeeklyCommission,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let orders_count = i32::try_from(row.orders_count).unwrap_or(i32::MAX);

        sqlx::query(
            r#"
            INSERT INTO weekly_salary_totals (
                master_id, week_start, commission_amount, orders_count, bonuses_amount, total_amount, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (master_id, week_start) DO UPDATE
            SET commission_amount = EXCLUDED.commission_amount,
                orders_count = EXCLUDED.orders_count,
                bonuses_amount = EXCLUDED.bonuses_amount,
                total_amount = EXCLUDED.total_amount,
                computed_at = NOW()
            "#,
        )
        .bind(row.master_id)
        .bind(week_start)
        .bind(row.commission_amount)
        .bind(orders_count)
        .bind(row.bonuses_amount)
        .bind(row.commission_amount + row.bonuses_amount)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Remove linhas de masters que não têm mais nada na semana.
    pub async fn delete_stale_weekly_totals<'e, E>(
        &self,
        executor: E,
        week_start: NaiveDate,
        keep: &[Uuid],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "DELETE FROM weekly_salary_totals WHERE week_start = $1 AND NOT (master_id = ANY($2))",
        )
        .bind(week_start)
        .bind(keep)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_weekly_totals<'e, E>(
        &self,
        executor: E,
        master_id: Option<Uuid>,
        week_start: Option<NaiveDate>,
    ) -> Result<Vec<WeeklySalaryTotal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let totals = sqlx::query_as::<_, WeeklySalaryTotal>(
            r#"
            SELECT w.master_id, u.full_name AS master_name, w.week_start, w.commission_amount,
                   w.orders_count, w.bonuses_amount, w.total_amount, w.computed_at
            FROM weekly_salary_totals w
            LEFT JOIN users u ON u.id = w.master_id
            WHERE ($1::uuid IS NULL OR w.master_id = $1)
              AND ($2::date IS NULL OR w.week_start = $2)
            ORDER BY w.week_start DESC, u.full_name ASC
            "#,
        )
        .bind(master_id)
        .bind(week_start)
        .fetch_all(executor)
        .await?;

        Ok(totals)
    }

    // =========================================================================
    //  BÔNUS
    // =========================================================================

    pub async fn create_bonus<'e, E>(
        &self,
        executor: E,
        master_id: Uuid,
        amount: Decimal,
        reason: &str,
        week_start: NaiveDate,
        created_by: Uuid,
    ) -> Result<Uuid, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO bonuses (master_id, amount, reason, week_start, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(master_id)
        .bind(amount)
        .bind(reason)
        .bind(week_start)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(id)
    }

    pub async fn find_bonus<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Bonus>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let bonus = sqlx::query_as::<_, Bonus>(&format!("{BONUS_SELECT} WHERE b.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(bonus)
    }

    pub async fn list_bonuses<'e, E>(
        &self,
        executor: E,
        master_id: Option<Uuid>,
        week_start: Option<NaiveDate>,
    ) -> Result<Vec<Bonus>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let bonuses = sqlx::query_as::<_, Bonus>(&format!(
            r#"
            {BONUS_SELECT}
            WHERE ($1::uuid IS NULL OR b.master_id = $1)
              AND ($2::date IS NULL OR b.week_start = $2)
            ORDER BY b.week_start DESC, b.created_at DESC
            "#
        ))
        .bind(master_id)
        .bind(week_start)
        .fetch_all(executor)
        .await?;

        Ok(bonuses)
    }

    pub async fn delete_bonus<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM bonuses WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ResourceNotFound("Бонус".into()));
        }

        Ok(())
    }
}
