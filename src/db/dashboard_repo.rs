// src/db/dashboard_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, Postgres};

use crate::{
    common::error::AppError,
    models::dashboard::{DashboardSummary, StatisticsSnapshot, StatusCount},
};

/// Inícios de período já convertidos do fuso da oficina para UTC.
#[derive(Debug, Clone, Copy)]
pub struct PeriodStarts {
    pub today: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
}

const SNAPSHOT_COLUMNS: &str = "snapshot_date, orders_total, orders_open, orders_completed_week, \
                                revenue_week, revenue_month, parts_revenue_month, payments_today, \
                                debts_outstanding, created_at";

#[derive(Clone, Default)]
pub struct DashboardRepository;

impl DashboardRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_summary<'e, E>(&self, executor: E, starts: PeriodStarts) -> Result<DashboardSummary, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        // Uma transação só: todos os números vêm do mesmo snapshot
        let mut tx = executor.begin().await?;

        // A. Pedidos por status
        let orders_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(&mut *tx)
        .await?;

        let orders_total: i64 = orders_by_status.iter().map(|s| s.count).sum();
        let orders_open: i64 = orders_by_status
            .iter()
            .filter(|s| !s.status.is_terminal())
            .map(|s| s.count)
            .sum();

        // B. Concluídos e faturamento por período
        let (orders_completed_week, revenue_week, revenue_month): (i64, Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE completed_at >= $1),
                COALESCE(SUM(total_amount) FILTER (WHERE completed_at >= $1), 0),
                COALESCE(SUM(total_amount) FILTER (WHERE completed_at >= $2), 0)
            FROM orders
            WHERE status IN ('выдан', 'закрыт') AND completed_at >= LEAST($1, $2)
            "#,
        )
        .bind(starts.week)
        .bind(starts.month)
        .fetch_one(&mut *tx)
        .await?;

        // C. Vendas de peças no mês
        let parts_revenue_month: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount), 0) FROM parts_sales WHERE created_at >= $1",
        )
        .bind(starts.month)
        .fetch_one(&mut *tx)
        .await?;

        // D. Recebido hoje
        let payments_today: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE created_at >= $1",
        )
        .bind(starts.today)
        .fetch_one(&mut *tx)
        .await?;

        // E. Dívidas em aberto
        let debts_outstanding: Decimal =
            sqlx::query_scalar("SELECT COALESCE(SUM(remaining), 0) FROM debts WHERE remaining > 0")
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(DashboardSummary {
            orders_by_status,
            orders_total,
            orders_open,
            orders_completed_week,
            revenue_week,
            revenue_month,
            parts_revenue_month,
            payments_today,
            debts_outstanding,
        })
    }

    /// Um snapshot por data; rodar de novo no mesmo dia sobrescreve.
    pub async fn upsert_snapshot<'e, E>(
        &self,
        executor: E,
        snapshot_date: NaiveDate,
        summary: &DashboardSummary,
    ) -> Result<StatisticsSnapshot, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let snapshot = sqlx::query_as::<_, StatisticsSnapshot>(&format!(
            r#"
            INSERT INTO statistics_snapshots (
                snapshot_date, orders_total, orders_open, orders_completed_week, revenue_week,
                revenue_month, parts_revenue_month, payments_today, debts_outstanding
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (snapshot_date) DO UPDATE
            SET orders_total = EXCLUDED.orders_total,
                orders_open = EXCLUDED.orders_open,
                orders_completed_week = EXCLUDED.orders_completed_week,
                revenue_week = EXCLUDED.revenue_week,
                revenue_month = EXCLUDED.revenue_month,
                parts_revenue_month = EXCLUDED.parts_revenue_month,
                payments_today = EXCLUDED.payments_today,
                debts_outstanding = EXCLUDED.debts_outstanding,
                created_at = NOW()
            RETURNING {SNAPSHOT_COLUMNS}
            "#
        ))
        .bind(snapshot_date)
        .bind(summary.orders_total)
        .bind(summary.orders_open)
        .bind(summary.orders_completed_week)
        .bind(summary.revenue_week)
        .bind(summary.revenue_month)
        .bind(summary.parts_revenue_month)
        .bind(summary.payments_today)
        .bind(summary.debts_outstanding)
        .fetch_one(executor)
        .await?;

        Ok(snapshot)
    }

    pub async fn list_snapshots<'e, E>(&self, executor: E, days: i64) -> Result<Vec<StatisticsSnapshot>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let snapshots = sqlx::query_as::<_, StatisticsSnapshot>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM statistics_snapshots ORDER BY snapshot_date DESC LIMIT $1"
        ))
        .bind(days)
        .fetch_all(executor)
        .await?;

        Ok(snapshots)
    }
}
