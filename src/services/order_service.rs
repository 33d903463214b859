// src/services/order_service.rs

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        money::{ensure_non_negative, ensure_within_limit},
        response::{Paginated, PaginationQuery},
    },
    db::{
        order_repo::{OrderFilter, OrderValues, OrderViewer},
        OrderRepository, UserRepository,
    },
    middleware::rbac::ensure_order_access,
    models::{
        auth::User,
        orders::{
            sum_line_totals, CreateOrderPayload, MasterShare, Order, OrderDetail, OrderMaster,
            OrderStatus, ServiceLine, UpdateOrderPayload,
        },
    },
    services::{notification_service::NotificationService, salary_service::SalaryService},
};

// Tolerância da soma dos percentuais
const SHARE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

// ---
// Regras puras
// ---

/// `ZA` + 7 → `ZA007`; acima de 999 o número só cresce (`ZA1000`).
pub fn format_order_number(prefix: &str, number: i32) -> String {
    format!("{prefix}{number:03}")
}

/// Percentuais em (0, 100], sem master repetido, somando 100 (±0.01).
/// Pedido sem masters é aceito.
pub fn validate_master_shares(shares: &[MasterShare]) -> Result<(), AppError> {
    if shares.is_empty() {
        return Ok(());
    }

    let mut seen = HashSet::with_capacity(shares.len());
    for share in shares {
        if share.percentage <= Decimal::ZERO || share.percentage > Decimal::ONE_HUNDRED {
            return Err(AppError::InvalidInput(
                "Процент мастера должен быть больше 0 и не больше 100".into(),
            ));
        }
        if !seen.insert(share.master_id) {
            return Err(AppError::InvalidInput("Мастер указан в заказе дважды".into()));
        }
    }

    let total: Decimal = shares.iter().map(|s| s.percentage).sum();
    if (total - Decimal::ONE_HUNDRED).abs() > SHARE_TOLERANCE {
        return Err(AppError::InvalidInput(format!(
            "Сумма процентов мастеров должна быть 100, сейчас {}",
            total.normalize()
        )));
    }

    Ok(())
}

/// Custo de serviços derivado das linhas; preço negativo é recusado.
pub fn services_cost(lines: &[ServiceLine]) -> Result<Decimal, AppError> {
    for line in lines {
        ensure_non_negative(line.unit_price, "unitPrice")?;
    }
    let total = sum_line_totals(lines)?;
    ensure_within_limit(total, "servicesCost")?;
    Ok(total)
}

/// Masters que entraram agora (recebem notificação).
pub fn newly_assigned<'a>(previous: &[Uuid], next: &'a [MasterShare]) -> Vec<&'a MasterShare> {
    next.iter().filter(|s| !previous.contains(&s.master_id)).collect()
}

/// A transição que dispara o cálculo do salário.
pub fn enters_terminal(previous: OrderStatus, next: OrderStatus) -> bool {
    !previous.is_terminal() && next.is_terminal()
}

fn not_found() -> AppError {
    AppError::ResourceNotFound("Заказ".into())
}

#[derive(Clone)]
pub struct OrderService {
    repo: OrderRepository,
    user_repo: UserRepository,
    notifications: NotificationService,
    salaries: SalaryService,
    number_prefix: String,
}

impl OrderService {
    pub fn new(
        repo: OrderRepository,
        user_repo: UserRepository,
        notifications: NotificationService,
        salaries: SalaryService,
        number_prefix: String,
    ) -> Self {
        Self { repo, user_repo, notifications, salaries, number_prefix }
    }

    // =========================================================================
    //  CRIAÇÃO
    // =========================================================================

    pub async fn create_order<'e, E>(
        &self,
        executor: E,
        actor: &User,
        payload: &CreateOrderPayload,
    ) -> Result<OrderDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        ensure_non_negative(payload.parts_cost, "partsCost")?;
        let services_cost = services_cost(&payload.services)?;
        ensure_within_limit(payload.parts_cost + services_cost, "totalAmount")?;
        validate_master_shares(&payload.masters)?;

        let mut tx = executor.begin().await?;

        self.ensure_active_masters(&mut tx, &payload.masters).await?;

        let number = self.repo.allocate_order_number(&mut *tx, &self.number_prefix).await?;
        let order_number = format_order_number(&self.number_prefix, number);

        let values = OrderValues {
            client_id: payload.client_id,
            services: &payload.services,
            parts_cost: payload.parts_cost,
            services_cost,
            notes: payload.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()),
        };
        let order_id = self.repo.insert_order(&mut *tx, &order_number, &values, actor.id).await?;

        self.repo.replace_masters(&mut tx, order_id, &payload.masters).await?;
        for share in &payload.masters {
            if share.master_id != actor.id {
                self.notifications
                    .notify_assignment(&mut *tx, share.master_id, order_id, &order_number, share.percentage)
                    .await?;
            }
        }

        let detail = self.load_detail(&mut tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(%order_id, order_number = %order_number, "🧾 Pedido criado");
        Ok(detail)
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn get_order(&self, conn: &mut PgConnection, actor: &User, id: Uuid) -> Result<OrderDetail, AppError> {
        let (order, masters) = self.load_accessible(conn, actor, id).await?;
        Ok(OrderDetail { order, masters })
    }

    pub async fn list_orders(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        filter: &OrderFilter,
        pagination: &PaginationQuery,
    ) -> Result<Paginated<Order>, AppError> {
        let viewer = OrderViewer { user_id: actor.id, sees_everything: actor.role.is_management() };
        let (items, total) = self
            .repo
            .list_orders(conn, filter, viewer, pagination.limit(), pagination.offset())
            .await?;

        Ok(Paginated::new(items, pagination, total))
    }

    // =========================================================================
    //  EDIÇÃO
    // =========================================================================

    pub async fn update_order<'e, E>(
        &self,
        executor: E,
        actor: &User,
        id: Uuid,
        payload: &UpdateOrderPayload,
    ) -> Result<OrderDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        if let Some(parts_cost) = payload.parts_cost {
            ensure_non_negative(parts_cost, "partsCost")?;
        }
        if let Some(masters) = &payload.masters {
            validate_master_shares(masters)?;
        }

        let mut tx = executor.begin().await?;

        let (current, current_masters) = self.load_accessible(&mut tx, actor, id).await?;

        // Linhas enviadas substituem as anteriores, e o custo é recalculado
        let services: &[ServiceLine] = payload.services.as_deref().unwrap_or(&current.services.0);
        let parts_cost = payload.parts_cost.unwrap_or(current.parts_cost);
        let services_cost = services_cost(services)?;
        ensure_within_limit(parts_cost + services_cost, "totalAmount")?;

        let values = OrderValues {
            client_id: payload.client_id.or(current.client_id),
            services,
            parts_cost,
            services_cost,
            notes: match &payload.notes {
                Some(notes) => Some(notes.trim()).filter(|n| !n.is_empty()),
                None => current.notes.as_deref(),
            },
        };
        self.repo.update_order_values(&mut *tx, id, &values).await?;

        if let Some(masters) = &payload.masters {
            self.ensure_active_masters(&mut tx, masters).await?;

            let previous: Vec<Uuid> = current_masters.iter().map(|m| m.master_id).collect();
            self.repo.replace_masters(&mut tx, id, masters).await?;

            for share in newly_assigned(&previous, masters) {
                if share.master_id != actor.id {
                    self.notifications
                        .notify_assignment(&mut *tx, share.master_id, id, &current.order_number, share.percentage)
                        .await?;
                }
            }
        }

        let detail = self.load_detail(&mut tx, id).await?;
        tx.commit().await?;

        Ok(detail)
    }

    // =========================================================================
    //  STATUS
    // =========================================================================

    /// Muda o status com a linha travada. Ao entrar em status final vindo de
    /// um não-final, registra o salário de cada master atribuído.
    pub async fn change_status<'e, E>(
        &self,
        executor: E,
        actor: &User,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let Some(locked) = self.repo.lock_order(&mut *tx, id).await? else {
            return Err(self.missing_or_forbidden(&mut tx, id).await);
        };

        let masters = self.repo.list_masters(&mut *tx, id).await?;
        let master_ids: Vec<Uuid> = masters.iter().map(|m| m.master_id).collect();
        ensure_order_access(actor, locked.created_by, &master_ids)?;

        if locked.status != status {
            let completed_at = status.is_terminal().then(Utc::now);
            self.repo.set_status(&mut *tx, id, status, completed_at).await?;

            tracing::info!(
                order_id = %id,
                from = locked.status.as_str(),
                to = status.as_str(),
                "Status do pedido alterado"
            );

            if enters_terminal(locked.status, status) {
                let order = self.repo.find_order(&mut *tx, id).await?.ok_or_else(not_found)?;
                self.salaries
                    .record_for_order(&mut *tx, id, order.total_amount, &masters)
                    .await?;
            }
        }

        let detail = self.load_detail(&mut tx, id).await?;
        tx.commit().await?;

        Ok(detail)
    }

    pub async fn delete_order<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.delete_order(executor, id).await?;
        tracing::info!(order_id = %id, "Pedido removido");
        Ok(())
    }

    // =========================================================================
    //  AUXILIARES
    // =========================================================================

    /// Pedido + masters, com a regra de acesso do master aplicada.
    pub(crate) async fn load_accessible(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        id: Uuid,
    ) -> Result<(Order, Vec<OrderMaster>), AppError> {
        let Some(order) = self.repo.find_order(&mut *conn, id).await? else {
            return Err(self.missing_or_forbidden(conn, id).await);
        };

        let masters = self.repo.list_masters(&mut *conn, id).await?;
        let master_ids: Vec<Uuid> = masters.iter().map(|m| m.master_id).collect();
        ensure_order_access(actor, order.created_by, &master_ids)?;

        Ok((order, masters))
    }

    async fn load_detail(&self, conn: &mut PgConnection, id: Uuid) -> Result<OrderDetail, AppError> {
        let order = self.repo.find_order(&mut *conn, id).await?.ok_or_else(not_found)?;
        let masters = self.repo.list_masters(&mut *conn, id).await?;
        Ok(OrderDetail { order, masters })
    }

    // Invisível pelo RLS mas existente = sem acesso
    async fn missing_or_forbidden(&self, conn: &mut PgConnection, id: Uuid) -> AppError {
        match self.repo.order_exists(conn, id).await {
            Ok(true) => AppError::Forbidden("Нет доступа к этому заказу".into()),
            Ok(false) => not_found(),
            Err(e) => e,
        }
    }

    async fn ensure_active_masters(&self, conn: &mut PgConnection, shares: &[MasterShare]) -> Result<(), AppError> {
        if shares.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = shares.iter().map(|s| s.master_id).collect();
        let active = self.user_repo.count_active_masters(conn, &ids).await?;
        if active != ids.len() as i64 {
            return Err(AppError::InvalidInput(
                "Назначать можно только активных мастеров".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::{create_user, order_service, rls_tx};
    use crate::models::auth::UserRole;
    use sqlx::PgPool;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn share(pct: &str) -> MasterShare {
        MasterShare { master_id: Uuid::new_v4(), percentage: d(pct) }
    }

    #[test]
    fn numbers_are_zero_padded_to_three_digits() {
        assert_eq!(format_order_number("ZA", 1), "ZA001");
        assert_eq!(format_order_number("ZA", 2), "ZA002");
        assert_eq!(format_order_number("ZA", 999), "ZA999");
        assert_eq!(format_order_number("ZA", 1000), "ZA1000");
    }

    #[test]
    fn shares_summing_to_hundred_are_accepted() {
        assert!(validate_master_shares(&[share("60"), share("40")]).is_ok());
        assert!(validate_master_shares(&[share("33.33"), share("33.33"), share("33.34")]).is_ok());
        assert!(validate_master_shares(&[share("100")]).is_ok());
    }

    #[test]
    fn rounding_slack_is_one_cent() {
        assert!(validate_master_shares(&[share("33.33"), share("33.33"), share("33.33")]).is_ok());
        assert!(validate_master_shares(&[share("33.33"), share("33.33"), share("33.32")]).is_err());
    }

    #[test]
    fn wrong_sum_is_rejected() {
        let err = validate_master_shares(&[share("60"), share("30")]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn order_without_masters_is_allowed() {
        assert!(validate_master_shares(&[]).is_ok());
    }

    #[test]
    fn out_of_range_or_duplicated_percentages_are_rejected() {
        assert!(validate_master_shares(&[share("0"), share("100")]).is_err());
        assert!(validate_master_shares(&[share("120"), share("-20")]).is_err());

        let repeated = share("50");
        assert!(validate_master_shares(&[repeated.clone(), repeated]).is_err());
    }

    #[test]
    fn services_cost_sums_lines_and_rejects_negative_prices() {
        let lines = vec![
            ServiceLine { service_id: None, name: "Замена масла".into(), unit_price: d("1500"), quantity: 1 },
            ServiceLine { service_id: None, name: "Свечи".into(), unit_price: d("300.50"), quantity: 4 },
        ];
        assert_eq!(services_cost(&lines).unwrap(), d("2702.00"));

        let negative = vec![ServiceLine {
            service_id: None,
            name: "Скидка".into(),
            unit_price: d("-100"),
            quantity: 1,
        }];
        assert!(services_cost(&negative).is_err());
    }

    #[test]
    fn services_cost_beyond_the_column_is_rejected() {
        let lines = vec![ServiceLine {
            service_id: None,
            name: "Кузовной ремонт".into(),
            unit_price: d("9999999999"),
            quantity: 2,
        }];
        assert!(matches!(services_cost(&lines), Err(AppError::InvalidInput(_))));

        let json_line: ServiceLine = serde_json::from_value(serde_json::json!({
            "name": "Диагностика",
            "unitPrice": "50000000000000000000000000000",
            "quantity": 2
        }))
        .unwrap();
        assert!(matches!(services_cost(&[json_line]), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn only_new_masters_are_notified() {
        let kept = share("50");
        let added = share("50");
        let next = vec![kept.clone(), added.clone()];

        let fresh = newly_assigned(&[kept.master_id], &next);
        assert_eq!(fresh, vec![&added]);
    }

    #[test]
    fn salary_trigger_fires_only_when_entering_terminal() {
        assert!(enters_terminal(OrderStatus::Ready, OrderStatus::HandedOver));
        assert!(enters_terminal(OrderStatus::New, OrderStatus::Closed));
        assert!(!enters_terminal(OrderStatus::HandedOver, OrderStatus::Closed));
        assert!(!enters_terminal(OrderStatus::InProgress, OrderStatus::Ready));
        assert!(!enters_terminal(OrderStatus::Closed, OrderStatus::InProgress));
    }

    // --- Contra o Postgres ---

    fn order_with(masters: Vec<MasterShare>) -> CreateOrderPayload {
        CreateOrderPayload {
            client_id: None,
            services: vec![ServiceLine {
                service_id: None,
                name: "Ремонт подвески".into(),
                unit_price: d("1000"),
                quantity: 1,
            }],
            parts_cost: Decimal::ZERO,
            notes: None,
            masters,
        }
    }

    #[sqlx::test]
    async fn order_numbers_start_at_one_and_increase(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let service = order_service(&pool);

        let mut tx = rls_tx(&pool, &admin).await;
        let first = service.create_order(&mut *tx, &admin, &order_with(vec![])).await.unwrap();
        let second = service.create_order(&mut *tx, &admin, &order_with(vec![])).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.order.order_number, "ZA001");
        assert_eq!(second.order.order_number, "ZA002");
        assert_eq!(first.order.total_amount, d("1000.00"));
    }

    #[sqlx::test]
    async fn reentering_a_final_status_keeps_one_salary_row_per_master(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let m1 = create_user(&pool, UserRole::Master).await;
        let m2 = create_user(&pool, UserRole::Master).await;
        let service = order_service(&pool);

        let shares = vec![
            MasterShare { master_id: m1.id, percentage: d("60") },
            MasterShare { master_id: m2.id, percentage: d("40") },
        ];

        let mut tx = rls_tx(&pool, &admin).await;
        let order = service.create_order(&mut *tx, &admin, &order_with(shares)).await.unwrap();
        let id = order.order.id;

        for status in [
            OrderStatus::HandedOver,
            OrderStatus::Closed,
            OrderStatus::Ready,
            OrderStatus::HandedOver,
        ] {
            service.change_status(&mut *tx, &admin, id, status).await.unwrap();
        }
        tx.commit().await.unwrap();

        let rows: Vec<(Uuid, Decimal)> = sqlx::query_as(
            "SELECT master_id, amount FROM salaries WHERE order_id = $1 ORDER BY amount DESC",
        )
        .bind(id)
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(rows, vec![(m1.id, d("600.00")), (m2.id, d("400.00"))]);
    }

    #[sqlx::test]
    async fn master_gets_forbidden_for_someone_elses_order(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let master = create_user(&pool, UserRole::Master).await;
        let service = order_service(&pool);

        let mut tx = rls_tx(&pool, &admin).await;
        let order = service.create_order(&mut *tx, &admin, &order_with(vec![])).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = rls_tx(&pool, &master).await;
        let result = service.get_order(&mut tx, &master, order.order.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let missing = service.get_order(&mut tx, &master, Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AppError::ResourceNotFound(_))));
    }

    #[sqlx::test]
    async fn row_level_security_hides_foreign_orders_from_masters(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let master = create_user(&pool, UserRole::Master).await;
        let colleague = create_user(&pool, UserRole::Master).await;
        let service = order_service(&pool);

        let mut tx = rls_tx(&pool, &admin).await;
        service.create_order(&mut *tx, &admin, &order_with(vec![])).await.unwrap();
        let shared = vec![
            MasterShare { master_id: master.id, percentage: d("50") },
            MasterShare { master_id: colleague.id, percentage: d("50") },
        ];
        let assigned = service.create_order(&mut *tx, &admin, &order_with(shared)).await.unwrap();
        tx.commit().await.unwrap();

        let count = "SELECT COUNT(*) FROM orders";

        let mut tx = rls_tx(&pool, &admin).await;
        let seen: i64 = sqlx::query_scalar(count).fetch_one(&mut *tx).await.unwrap();
        assert_eq!(seen, 2);
        tx.rollback().await.unwrap();

        // Sem filtro na consulta: quem filtra é a política
        let mut tx = rls_tx(&pool, &master).await;
        let seen: i64 = sqlx::query_scalar(count).fetch_one(&mut *tx).await.unwrap();
        assert_eq!(seen, 1);

        let detail = service.get_order(&mut tx, &master, assigned.order.id).await.unwrap();
        assert_eq!(detail.masters.len(), 2, "co-master também aparece");
    }
}
