// src/services/salary_service.rs

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        money::{amount_too_large, ensure_within_limit, round_money},
        response::{Paginated, PaginationQuery},
    },
    db::{salary_repo::SalaryShare, SalaryRepository},
    models::{
        auth::User,
        orders::OrderMaster,
        salaries::{Bonus, CreateBonusPayload, Salary, WeeklyRecalculation, WeeklySalaryTotal},
    },
};

// ---
// Regras puras
// ---

/// Parte do master: total × percentual / 100, em 2 casas.
pub fn salary_share(order_total: Decimal, percentage: Decimal) -> Result<Decimal, AppError> {
    order_total
        .checked_mul(percentage)
        .map(|v| round_money(v / Decimal::ONE_HUNDRED))
        .ok_or_else(|| amount_too_large("amount"))
}

/// Segunda-feira da semana que contém `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn current_week_start(offset: FixedOffset, now: DateTime<Utc>) -> NaiveDate {
    week_start(now.with_timezone(&offset).date_naive())
}

/// Meia-noite local de `date` expressa em UTC.
pub fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, Utc)
}

/// Intervalo [segunda 00:00, próxima segunda 00:00) no fuso da oficina.
pub fn week_bounds_utc(week_start: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = local_midnight_utc(week_start, offset);
    (from, from + Duration::days(7))
}

pub fn shares_for_order(order_total: Decimal, masters: &[OrderMaster]) -> Result<Vec<SalaryShare>, AppError> {
    masters
        .iter()
        .map(|m| {
            Ok(SalaryShare {
                master_id: m.master_id,
                amount: salary_share(order_total, m.percentage)?,
                percentage: m.percentage,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct SalaryService {
    repo: SalaryRepository,
    offset: FixedOffset,
}

impl SalaryService {
    pub fn new(repo: SalaryRepository, offset: FixedOffset) -> Self {
        Self { repo, offset }
    }

    pub fn current_week_start(&self) -> NaiveDate {
        current_week_start(self.offset, Utc::now())
    }

    // =========================================================================
    //  SALÁRIO POR PEDIDO (transição para status final)
    // =========================================================================

    /// Grava a parte de cada master. Primeira gravação vence: rodar de novo
    /// para o mesmo pedido não duplica nem altera nada.
    pub async fn record_for_order<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        order_total: Decimal,
        masters: &[OrderMaster],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shares = shares_for_order(order_total, masters)?;
        let inserted = self
            .repo
            .insert_salaries(executor, order_id, self.current_week_start(), &shares)
            .await?;

        if inserted > 0 {
            tracing::info!(%order_id, inserted, "💰 Salários do pedido registrados");
        }

        Ok(inserted)
    }

    /// Master só enxerga os próprios lançamentos.
    pub async fn list_salaries(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        master_id: Option<Uuid>,
        week: Option<NaiveDate>,
        pagination: &PaginationQuery,
    ) -> Result<Paginated<Salary>, AppError> {
        let master_id = scoped_master(actor, master_id);
        let (items, total) = self
            .repo
            .list_salaries(conn, master_id, week.map(week_start), pagination.limit(), pagination.offset())
            .await?;

        Ok(Paginated::new(items, pagination, total))
    }

    // =========================================================================
    //  TOTAIS SEMANAIS
    // =========================================================================

    pub async fn list_weekly_totals<'e, E>(
        &self,
        executor: E,
        actor: &User,
        master_id: Option<Uuid>,
        week: Option<NaiveDate>,
    ) -> Result<Vec<WeeklySalaryTotal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .list_weekly_totals(executor, scoped_master(actor, master_id), week.map(week_start))
            .await
    }

    /// Recalcula a semana que contém `any_day`. Sobrescreve os totais, então
    /// repetir converge no mesmo resultado. O lock consultivo só é solto no
    /// commit da transação externa: job e disparo manual (de qualquer
    /// instância) nunca gravam a mesma semana ao mesmo tempo.
    pub async fn recalculate_week<'e, E>(&self, executor: E, any_day: NaiveDate) -> Result<WeeklyRecalculation, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let week = week_start(any_day);
        let (from, to) = week_bounds_utc(week, self.offset);

        let mut tx = executor.begin().await?;
        self.repo.lock_week_recalculation(&mut *tx, week).await?;

        let rows = self.repo.weekly_commissions(&mut *tx, week, from, to).await?;
        for row in &rows {
            self.repo.upsert_weekly_total(&mut *tx, week, row).await?;
        }

        let kept: Vec<Uuid> = rows.iter().map(|r| r.master_id).collect();
        self.repo.delete_stale_weekly_totals(&mut *tx, week, &kept).await?;

        tx.commit().await?;

        tracing::info!(week_start = %week, masters = rows.len(), "📊 Totais semanais recalculados");

        Ok(WeeklyRecalculation { week_start: week, masters_updated: rows.len() })
    }

    // =========================================================================
    //  BÔNUS
    // =========================================================================

    pub async fn create_bonus<'e, E>(
        &self,
        executor: E,
        actor: &User,
        payload: &CreateBonusPayload,
    ) -> Result<Bonus, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        if payload.amount.is_zero() {
            return Err(AppError::InvalidInput("Сумма бонуса не может быть нулевой".into()));
        }
        ensure_within_limit(payload.amount, "amount")?;

        let week = payload.week_start.map(week_start).unwrap_or_else(|| self.current_week_start());

        let mut tx = executor.begin().await?;
        let id = self
            .repo
            .create_bonus(&mut *tx, payload.master_id, round_money(payload.amount), payload.reason.trim(), week, actor.id)
            .await?;
        let bonus = self
            .repo
            .find_bonus(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Бонус".into()))?;
        tx.commit().await?;

        Ok(bonus)
    }

    pub async fn list_bonuses<'e, E>(
        &self,
        executor: E,
        actor: &User,
        master_id: Option<Uuid>,
        week: Option<NaiveDate>,
    ) -> Result<Vec<Bonus>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .list_bonuses(executor, scoped_master(actor, master_id), week.map(week_start))
            .await
    }

    pub async fn delete_bonus<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.delete_bonus(executor, id).await
    }
}

/// Filtro de master efetivo: para um master, sempre ele mesmo.
fn scoped_master(actor: &User, requested: Option<Uuid>) -> Option<Uuid> {
    if actor.role.is_management() {
        requested
    } else {
        Some(actor.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::{create_user, order_service, rls_tx, salary_service};
    use crate::models::{
        auth::UserRole,
        orders::{CreateOrderPayload, MasterShare, OrderStatus, ServiceLine},
    };
    use chrono::TimeZone;
    use sqlx::PgPool;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn master(id: Uuid, pct: &str) -> OrderMaster {
        OrderMaster { order_id: Uuid::nil(), master_id: id, master_name: "Мастер".into(), percentage: d(pct) }
    }

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            full_name: "Тест".into(),
            email: Some("t@example.com".into()),
            phone: None,
            password_hash: None,
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn shares_split_total_by_percentage() {
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let shares = shares_for_order(d("1000"), &[master(m1, "60"), master(m2, "40")]).unwrap();

        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].amount, d("600.00"));
        assert_eq!(shares[1].amount, d("400.00"));
        assert_eq!(shares[0].master_id, m1);
    }

    #[test]
    fn share_is_rounded_to_cents() {
        assert_eq!(salary_share(d("1000.00"), d("33.33")).unwrap(), d("333.30"));
        assert_eq!(salary_share(d("999.99"), d("33.33")).unwrap(), d("333.30"));
        assert_eq!(salary_share(d("10.01"), d("50")).unwrap(), d("5.01"));
    }

    #[test]
    fn overflowing_share_is_an_error() {
        assert!(matches!(salary_share(Decimal::MAX, d("60")), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn week_starts_on_monday() {
        let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        for offset in 0..7 {
            assert_eq!(week_start(monday + Duration::days(offset)), monday);
        }
        assert_eq!(week_start(monday - Duration::days(1)), monday - Duration::days(7));
    }

    #[test]
    fn business_offset_moves_late_sunday_into_next_week() {
        // Domingo 22:30 UTC = segunda 01:30 em UTC+3
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 22, 30, 0).unwrap();
        let msk = FixedOffset::east_opt(3 * 3600).unwrap();

        assert_eq!(current_week_start(msk, now), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(
            current_week_start(FixedOffset::east_opt(0).unwrap(), now),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
        );
    }

    #[test]
    fn week_bounds_are_local_midnights() {
        let msk = FixedOffset::east_opt(3 * 3600).unwrap();
        let (from, to) = week_bounds_utc(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), msk);

        assert_eq!(from, Utc.with_ymd_and_hms(2025, 3, 2, 21, 0, 0).unwrap());
        assert_eq!(to - from, Duration::days(7));
    }

    #[test]
    fn masters_are_always_scoped_to_themselves() {
        let m = user(UserRole::Master);
        let other = Uuid::new_v4();
        assert_eq!(scoped_master(&m, Some(other)), Some(m.id));
        assert_eq!(scoped_master(&m, None), Some(m.id));

        let admin = user(UserRole::Admin);
        assert_eq!(scoped_master(&admin, Some(other)), Some(other));
        assert_eq!(scoped_master(&admin, None), None);
    }

    // --- Contra o Postgres ---

    const TRY_WEEK_LOCK: &str = "SELECT pg_try_advisory_xact_lock(hashtext('weekly_salary_totals'), ($1::date - DATE '2000-01-03')::int)";

    async fn week_lock_is_free(pool: &PgPool, week: NaiveDate) -> bool {
        let mut tx = pool.begin().await.unwrap();
        let acquired: bool = sqlx::query_scalar(TRY_WEEK_LOCK).bind(week).fetch_one(&mut *tx).await.unwrap();
        tx.rollback().await.unwrap();
        acquired
    }

    #[sqlx::test]
    async fn week_stays_locked_until_the_outer_commit(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let service = salary_service();
        let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        let mut tx = rls_tx(&pool, &admin).await;
        service.recalculate_week(&mut *tx, monday + Duration::days(2)).await.unwrap();

        assert!(!week_lock_is_free(&pool, monday).await);
        assert!(week_lock_is_free(&pool, monday + Duration::days(7)).await);

        tx.commit().await.unwrap();
        assert!(week_lock_is_free(&pool, monday).await);
    }

    #[sqlx::test]
    async fn weekly_total_adds_commission_and_bonuses(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let master = create_user(&pool, UserRole::Master).await;
        let orders = order_service(&pool);
        let service = salary_service();

        let payload = CreateOrderPayload {
            client_id: None,
            services: vec![ServiceLine {
                service_id: None,
                name: "Замена ГРМ".into(),
                unit_price: d("1000"),
                quantity: 1,
            }],
            parts_cost: Decimal::ZERO,
            notes: None,
            masters: vec![MasterShare { master_id: master.id, percentage: d("100") }],
        };

        let mut tx = rls_tx(&pool, &admin).await;
        let order = orders.create_order(&mut *tx, &admin, &payload).await.unwrap();
        orders.change_status(&mut *tx, &admin, order.order.id, OrderStatus::HandedOver).await.unwrap();

        let bonus = CreateBonusPayload {
            master_id: master.id,
            amount: d("500"),
            reason: "Без переделок за месяц".into(),
            week_start: None,
        };
        service.create_bonus(&mut *tx, &admin, &bonus).await.unwrap();

        let week = service.current_week_start();
        let result = service.recalculate_week(&mut *tx, week).await.unwrap();
        assert_eq!(result.masters_updated, 1);
        tx.commit().await.unwrap();

        // O master lê só a própria linha
        let mut tx = rls_tx(&pool, &master).await;
        let totals = service.list_weekly_totals(&mut *tx, &master, None, Some(week)).await.unwrap();

        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].commission_amount, d("1000.00"));
        assert_eq!(totals[0].bonuses_amount, d("500.00"));
        assert_eq!(totals[0].total_amount, d("1500.00"));
        assert_eq!(totals[0].orders_count, 1);
    }
}
