// src/services/dashboard_service.rs

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use sqlx::{Acquire, Executor, Postgres};

use crate::{
    common::error::AppError,
    db::{dashboard_repo::PeriodStarts, DashboardRepository},
    models::dashboard::{DashboardSummary, StatisticsSnapshot},
    services::salary_service::{local_midnight_utc, week_start},
};

/// Hoje, segunda-feira da semana e dia 1 do mês, no fuso da oficina.
pub fn period_starts(now: DateTime<Utc>, offset: FixedOffset) -> PeriodStarts {
    let today = now.with_timezone(&offset).date_naive();
    let month = today.with_day(1).unwrap_or(today);

    PeriodStarts {
        today: local_midnight_utc(today, offset),
        week: local_midnight_utc(week_start(today), offset),
        month: local_midnight_utc(month, offset),
    }
}

#[derive(Clone)]
pub struct DashboardService {
    repo: DashboardRepository,
    offset: FixedOffset,
}

impl DashboardService {
    pub fn new(repo: DashboardRepository, offset: FixedOffset) -> Self {
        Self { repo, offset }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    pub async fn get_summary<'e, E>(&self, executor: E) -> Result<DashboardSummary, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        self.repo.get_summary(executor, period_starts(Utc::now(), self.offset)).await
    }

    /// Grava (ou regrava) o snapshot de hoje.
    pub async fn take_snapshot<'e, E>(&self, executor: E) -> Result<StatisticsSnapshot, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let summary = self.repo.get_summary(&mut *tx, period_starts(Utc::now(), self.offset)).await?;
        let snapshot = self.repo.upsert_snapshot(&mut *tx, self.today(), &summary).await?;

        tx.commit().await?;

        tracing::info!(date = %snapshot.snapshot_date, "📈 Snapshot de estatísticas gravado");
        Ok(snapshot)
    }

    pub async fn list_snapshots<'e, E>(&self, executor: E, days: i64) -> Result<Vec<StatisticsSnapshot>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_snapshots(executor, days.clamp(1, 366)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn periods_follow_the_business_timezone() {
        let msk = FixedOffset::east_opt(3 * 3600).unwrap();
        // Quinta 2025-03-06 01:00 em Moscou
        let now = Utc.with_ymd_and_hms(2025, 3, 5, 22, 0, 0).unwrap();

        let starts = period_starts(now, msk);
        assert_eq!(starts.today, Utc.with_ymd_and_hms(2025, 3, 5, 21, 0, 0).unwrap());
        assert_eq!(starts.week, Utc.with_ymd_and_hms(2025, 3, 2, 21, 0, 0).unwrap());
        assert_eq!(starts.month, Utc.with_ymd_and_hms(2025, 2, 28, 21, 0, 0).unwrap());
    }

    #[test]
    fn first_day_of_month_is_its_own_month_start() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let starts = period_starts(now, utc);
        assert_eq!(starts.month, starts.today);
    }
}
