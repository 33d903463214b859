// src/services/jobs.rs

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;

use crate::{
    common::{db_utils::begin_system_transaction, error::AppError},
    config::Config,
    models::{dashboard::StatisticsSnapshot, salaries::WeeklyRecalculation},
    services::{
        dashboard_service::DashboardService, notification_service::NotificationService,
        salary_service::{current_week_start, SalaryService},
    },
};

/// Tarefas periódicas: totais semanais, limpeza de notificações e
/// snapshots do dashboard. Cada uma roda com o papel `system` no RLS.
#[derive(Clone)]
pub struct JobRunner {
    pool: PgPool,
    config: Arc<Config>,
    salary_service: SalaryService,
    notification_service: NotificationService,
    dashboard_service: DashboardService,
}

impl JobRunner {
    pub fn new(
        pool: PgPool,
        config: Arc<Config>,
        salary_service: SalaryService,
        notification_service: NotificationService,
        dashboard_service: DashboardService,
    ) -> Self {
        Self { pool, config, salary_service, notification_service, dashboard_service }
    }

    /// Recalcula a semana anterior e a atual: pedidos fechados depois da
    /// última execução antes da virada de segunda ainda entram na semana certa.
    pub async fn run_weekly_salaries(&self) -> Result<Vec<WeeklyRecalculation>, AppError> {
        let current = current_week_start(self.config.business_offset(), Utc::now());

        let mut results = Vec::with_capacity(2);
        for week in weeks_to_recalculate(current) {
            let mut tx = begin_system_transaction(&self.pool).await?;
            results.push(self.salary_service.recalculate_week(&mut *tx, week).await?);
            tx.commit().await?;
        }

        Ok(results)
    }

    pub async fn run_notification_cleanup(&self) -> Result<u64, AppError> {
        let mut tx = begin_system_transaction(&self.pool).await?;
        let removed = self
            .notification_service
            .cleanup(&mut *tx, self.config.notification_retention_days)
            .await?;
        tx.commit().await?;
        Ok(removed)
    }

    pub async fn run_statistics_snapshot(&self) -> Result<StatisticsSnapshot, AppError> {
        let mut tx = begin_system_transaction(&self.pool).await?;
        let snapshot = self.dashboard_service.take_snapshot(&mut *tx).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Sobe os três loops. Falha em uma execução só gera log; o loop segue.
    pub fn spawn_all(&self) {
        let runner = self.clone();
        spawn_loop("weekly_salaries", self.config.salary_job_interval_secs, move || {
            let runner = runner.clone();
            async move { runner.run_weekly_salaries().await.map(|_| ()) }
        });

        let runner = self.clone();
        spawn_loop("notification_cleanup", self.config.cleanup_job_interval_secs, move || {
            let runner = runner.clone();
            async move { runner.run_notification_cleanup().await.map(|_| ()) }
        });

        let runner = self.clone();
        spawn_loop("statistics_snapshot", self.config.stats_job_interval_secs, move || {
            let runner = runner.clone();
            async move { runner.run_statistics_snapshot().await.map(|_| ()) }
        });
    }
}

pub fn weeks_to_recalculate(current_week: NaiveDate) -> [NaiveDate; 2] {
    [current_week - chrono::Duration::days(7), current_week]
}

fn spawn_loop<F, Fut>(name: &'static str, every_secs: u64, job: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = job().await {
                tracing::error!(job = name, error = ?e, "Job agendado falhou");
            }
        }
    });

    tracing::info!(job = name, every_secs, "⏱️ Job agendado iniciado");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_week_is_recalculated_before_the_current_one() {
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(
            weeks_to_recalculate(monday),
            [NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), monday]
        );
    }
}
