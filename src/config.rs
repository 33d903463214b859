// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::{Duration, Instant}};

use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        CatalogRepository, ClientRepository, DashboardRepository, FinanceRepository,
        NotificationRepository, OrderRepository, SalaryRepository, UserRepository,
    },
    services::{
        auth::{AuthService, CodeSender, HttpSmsSender, LogCodeSender},
        client_service::ClientService,
        dashboard_service::DashboardService,
        finance_service::FinanceService,
        jobs::JobRunner,
        notification_service::NotificationService,
        order_service::OrderService,
        salary_service::SalaryService,
        user_service::UserService,
    },
};

/// Configuração lida do ambiente (.env em desenvolvimento).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub environment: String,
    pub bind_addr: String,
    pub database_max_connections: u32,
    pub session_ttl_hours: i64,
    pub order_number_prefix: String,
    pub business_utc_offset_hours: i32,
    pub notification_retention_days: i64,
    pub salary_job_interval_secs: u64,
    pub cleanup_job_interval_secs: u64,
    pub stats_job_interval_secs: u64,
    pub oauth_userinfo_url: Option<String>,
    pub sms_gateway_url: Option<String>,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} deve ser definida"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn or_default<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} tem um valor inválido: {raw}")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let business_utc_offset_hours: i32 = or_default("BUSINESS_UTC_OFFSET_HOURS", 3)?;
        if !(-12..=14).contains(&business_utc_offset_hours) {
            anyhow::bail!("BUSINESS_UTC_OFFSET_HOURS fora do intervalo -12..14: {business_utc_offset_hours}");
        }

        let order_number_prefix = optional("ORDER_NUMBER_PREFIX").unwrap_or_else(|| "ZA".to_string());
        if !order_number_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            anyhow::bail!("ORDER_NUMBER_PREFIX deve ser alfanumérico: {order_number_prefix}");
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            environment: optional("APP_ENV").unwrap_or_else(|| "development".to_string()),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            database_max_connections: or_default("DATABASE_MAX_CONNECTIONS", 5)?,
            session_ttl_hours: or_default("SESSION_TTL_HOURS", 168)?,
            order_number_prefix,
            business_utc_offset_hours,
            notification_retention_days: or_default("NOTIFICATION_RETENTION_DAYS", 30)?,
            salary_job_interval_secs: or_default("SALARY_JOB_INTERVAL_SECS", 3600)?,
            cleanup_job_interval_secs: or_default("CLEANUP_JOB_INTERVAL_SECS", 86400)?,
            stats_job_interval_secs: or_default("STATS_JOB_INTERVAL_SECS", 3600)?,
            oauth_userinfo_url: optional("OAUTH_USERINFO_URL"),
            sms_gateway_url: optional("SMS_GATEWAY_URL"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Fuso da oficina, usado para "hoje" e "início da semana".
    pub fn business_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.business_utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub started_at: Instant,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub client_service: ClientService,
    pub catalog_repo: CatalogRepository,
    pub order_service: OrderService,
    pub finance_service: FinanceService,
    pub salary_service: SalaryService,
    pub notification_service: NotificationService,
    pub dashboard_service: DashboardService,
    pub jobs: JobRunner,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::with_pool(db_pool, config))
    }

    /// Monta o gráfico de dependências sobre um pool já criado.
    pub fn with_pool(db_pool: PgPool, config: Config) -> Self {
        crate::common::error::set_expose_internal_details(!config.is_production());

        let config = Arc::new(config);

        let user_repo = UserRepository::new(db_pool.clone());
        let client_repo = ClientRepository::new();
        let catalog_repo = CatalogRepository::new();
        let order_repo = OrderRepository::new();
        let finance_repo = FinanceRepository::new();
        let salary_repo = SalaryRepository::new();
        let notification_repo = NotificationRepository::new();
        let dashboard_repo = DashboardRepository::new();

        let code_sender: Arc<dyn CodeSender> = match &config.sms_gateway_url {
            Some(url) => Arc::new(HttpSmsSender::new(url.clone())),
            None => Arc::new(LogCodeSender),
        };

        let auth_service = AuthService::new(user_repo.clone(), config.clone(), code_sender);
        let user_service = UserService::new(user_repo.clone());
        let client_service = ClientService::new(client_repo);
        let notification_service = NotificationService::new(notification_repo);
        let salary_service = SalaryService::new(salary_repo, config.business_offset());
        let order_service = OrderService::new(
            order_repo,
            user_repo,
            notification_service.clone(),
            salary_service.clone(),
            config.order_number_prefix.clone(),
        );
        let finance_service = FinanceService::new(finance_repo, order_service.clone());
        let dashboard_service = DashboardService::new(dashboard_repo, config.business_offset());
        let jobs = JobRunner::new(
            db_pool.clone(),
            config.clone(),
            salary_service.clone(),
            notification_service.clone(),
            dashboard_service.clone(),
        );

        Self {
            db_pool,
            config,
            started_at: Instant::now(),
            auth_service,
            user_service,
            client_service,
            catalog_repo,
            order_service,
            finance_service,
            salary_service,
            notification_service,
            dashboard_service,
            jobs,
        }
    }
}
