// src/services/finance_service.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        money::{ensure_non_negative, ensure_positive, ensure_within_limit, round_money},
        response::{Paginated, PaginationQuery},
    },
    db::{finance_repo::PaymentRefs, FinanceRepository},
    middleware::rbac::ensure_owner_or_management,
    models::{
        auth::User,
        finance::{
            CreateDebtPayload, CreatePartsSalePayload, CreatePaymentPayload, Debt, PartsSale,
            Payment, PaymentReceipt,
        },
        orders::sum_line_totals,
    },
    services::{client_service::non_empty, order_service::OrderService},
};

/// Novo saldo da dívida depois de um pagamento. Nunca fica negativo:
/// pagar a mais simplesmente zera a dívida.
pub fn apply_payment_to_debt(remaining: Decimal, payment: Decimal) -> Decimal {
    (remaining - payment).max(Decimal::ZERO)
}

fn debt_not_found() -> AppError {
    AppError::ResourceNotFound("Долг".into())
}

fn parts_sale_not_found() -> AppError {
    AppError::ResourceNotFound("Продажа запчастей".into())
}

/// Master só lista o que registrou.
fn created_by_filter(actor: &User) -> Option<Uuid> {
    (!actor.role.is_management()).then_some(actor.id)
}

#[derive(Clone)]
pub struct FinanceService {
    repo: FinanceRepository,
    orders: OrderService,
}

impl FinanceService {
    pub fn new(repo: FinanceRepository, orders: OrderService) -> Self {
        Self { repo, orders }
    }

    // =========================================================================
    //  VENDAS DE PEÇAS
    // =========================================================================

    pub async fn create_parts_sale<'e, E>(
        &self,
        executor: E,
        actor: &User,
        payload: &CreatePartsSalePayload,
    ) -> Result<PartsSale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        for item in &payload.items {
            ensure_non_negative(item.unit_price, "unitPrice")?;
        }
        let total = sum_line_totals(&payload.items)?;
        ensure_within_limit(total, "totalAmount")?;

        let sale = self
            .repo
            .create_parts_sale(executor, payload.client_id, &payload.items, total, non_empty(&payload.notes), actor.id)
            .await?;

        tracing::info!(sale_id = %sale.id, total = %sale.total_amount, "🔩 Venda de peças registrada");
        Ok(sale)
    }

    pub async fn get_parts_sale<'e, E>(&self, executor: E, actor: &User, id: Uuid) -> Result<PartsSale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = self.repo.find_parts_sale(executor, id).await?.ok_or_else(parts_sale_not_found)?;
        ensure_owner_or_management(actor, sale.created_by)?;
        Ok(sale)
    }

    pub async fn list_parts_sales(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        client_id: Option<Uuid>,
        pagination: &PaginationQuery,
    ) -> Result<Paginated<PartsSale>, AppError> {
        let (items, total) = self
            .repo
            .list_parts_sales(conn, client_id, created_by_filter(actor), pagination.limit(), pagination.offset())
            .await?;

        Ok(Paginated::new(items, pagination, total))
    }

    // =========================================================================
    //  DÍVIDAS
    // =========================================================================

    pub async fn create_debt<'e, E>(
        &self,
        executor: E,
        actor: &User,
        payload: &CreateDebtPayload,
    ) -> Result<Debt, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        ensure_positive(payload.amount, "amount")?;

        let mut tx = executor.begin().await?;
        let id = self
            .repo
            .create_debt(
                &mut *tx,
                payload.client_id,
                payload.order_id,
                non_empty(&payload.description),
                round_money(payload.amount),
                payload.due_date,
                actor.id,
            )
            .await?;
        let debt = self.repo.find_debt(&mut *tx, id).await?.ok_or_else(debt_not_found)?;
        tx.commit().await?;

        tracing::info!(debt_id = %debt.id, amount = %debt.amount, "Dívida registrada");
        Ok(debt)
    }

    pub async fn get_debt<'e, E>(&self, executor: E, id: Uuid) -> Result<Debt, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.find_debt(executor, id).await?.ok_or_else(debt_not_found)
    }

    pub async fn list_debts(
        &self,
        conn: &mut PgConnection,
        client_id: Option<Uuid>,
        open_only: bool,
        pagination: &PaginationQuery,
    ) -> Result<Paginated<Debt>, AppError> {
        let (items, total) = self
            .repo
            .list_debts(conn, client_id, open_only, pagination.limit(), pagination.offset())
            .await?;

        Ok(Paginated::new(items, pagination, total))
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    /// Registra o pagamento e, se ele aponta para uma dívida, abate o saldo
    /// na mesma transação (linha da dívida travada).
    pub async fn record_payment<'e, E>(
        &self,
        executor: E,
        actor: &User,
        payload: &CreatePaymentPayload,
    ) -> Result<PaymentReceipt, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        ensure_positive(payload.amount, "amount")?;

        let refs = PaymentRefs {
            order_id: payload.order_id,
            parts_sale_id: payload.parts_sale_id,
            debt_id: payload.debt_id,
        };
        if refs.order_id.is_none() && refs.parts_sale_id.is_none() && refs.debt_id.is_none() {
            return Err(AppError::InvalidInput(
                "Платёж должен относиться к заказу, продаже запчастей или долгу".into(),
            ));
        }
        if refs.debt_id.is_some() && !actor.role.is_management() {
            return Err(AppError::Forbidden("Погашение долгов доступно только администрации".into()));
        }

        let amount = round_money(payload.amount);
        let mut tx = executor.begin().await?;

        if let Some(order_id) = refs.order_id {
            self.orders.load_accessible(&mut tx, actor, order_id).await?;
        }
        if let Some(sale_id) = refs.parts_sale_id {
            self.get_parts_sale(&mut *tx, actor, sale_id).await?;
        }

        let new_remaining = match refs.debt_id {
            Some(debt_id) => {
                let remaining = self
                    .repo
                    .lock_debt_remaining(&mut *tx, debt_id)
                    .await?
                    .ok_or_else(debt_not_found)?;
                Some((debt_id, apply_payment_to_debt(remaining, amount)))
            }
            None => None,
        };

        let payment: Payment = self
            .repo
            .insert_payment(&mut *tx, amount, payload.payment_type, refs, non_empty(&payload.notes), actor.id)
            .await?;

        let debt = match new_remaining {
            Some((debt_id, remaining)) => {
                self.repo.set_debt_remaining(&mut *tx, debt_id, remaining).await?;
                Some(self.repo.find_debt(&mut *tx, debt_id).await?.ok_or_else(debt_not_found)?)
            }
            None => None,
        };

        tx.commit().await?;

        tracing::info!(payment_id = %payment.id, amount = %payment.amount, "💳 Pagamento registrado");
        Ok(PaymentReceipt { payment, debt })
    }

    pub async fn list_payments(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        refs: PaymentRefs,
        pagination: &PaginationQuery,
    ) -> Result<Paginated<Payment>, AppError> {
        let (items, total) = self
            .repo
            .list_payments(conn, refs, created_by_filter(actor), pagination.limit(), pagination.offset())
            .await?;

        Ok(Paginated::new(items, pagination, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::{create_client, create_user, order_service, rls_tx};
    use crate::models::{auth::UserRole, finance::PaymentType};
    use sqlx::PgPool;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn partial_payment_reduces_remaining() {
        assert_eq!(apply_payment_to_debt(d("500"), d("200")), d("300"));
    }

    #[test]
    fn overpayment_floors_at_zero() {
        assert_eq!(apply_payment_to_debt(d("500"), d("700")), Decimal::ZERO);
    }

    #[test]
    fn exact_payment_settles_the_debt() {
        assert_eq!(apply_payment_to_debt(d("1500.50"), d("1500.50")), Decimal::ZERO);
    }

    #[test]
    fn repeated_payments_never_go_negative() {
        let mut remaining = d("1000");
        for _ in 0..5 {
            remaining = apply_payment_to_debt(remaining, d("300"));
            assert!(remaining >= Decimal::ZERO);
        }
        assert_eq!(remaining, Decimal::ZERO);
    }

    #[sqlx::test]
    async fn overpaying_a_debt_settles_it_at_zero(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let client_id = create_client(&pool).await;
        let service = FinanceService::new(FinanceRepository::new(), order_service(&pool));

        let mut tx = rls_tx(&pool, &admin).await;
        let debt = service
            .create_debt(
                &mut *tx,
                &admin,
                &CreateDebtPayload {
                    client_id,
                    order_id: None,
                    description: Some("Ремонт в долг".into()),
                    amount: d("500"),
                    due_date: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(debt.remaining, d("500.00"));

        let receipt = service
            .record_payment(
                &mut *tx,
                &admin,
                &CreatePaymentPayload {
                    amount: d("700"),
                    payment_type: PaymentType::Cash,
                    order_id: None,
                    parts_sale_id: None,
                    debt_id: Some(debt.id),
                    notes: None,
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(receipt.payment.amount, d("700.00"));
        assert_eq!(receipt.debt.map(|owed| owed.remaining), Some(Decimal::ZERO));

        let stored: Decimal = sqlx::query_scalar("SELECT remaining FROM debts WHERE id = $1")
            .bind(debt.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored, Decimal::ZERO);
    }

    #[sqlx::test]
    async fn masters_do_not_see_debts_at_all(pool: PgPool) {
        let admin = create_user(&pool, UserRole::Admin).await;
        let master = create_user(&pool, UserRole::Master).await;
        let client_id = create_client(&pool).await;
        let service = FinanceService::new(FinanceRepository::new(), order_service(&pool));

        let mut tx = rls_tx(&pool, &admin).await;
        let payload = CreateDebtPayload {
            client_id,
            order_id: None,
            description: None,
            amount: d("300"),
            due_date: None,
        };
        let debt = service.create_debt(&mut *tx, &admin, &payload).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = rls_tx(&pool, &master).await;
        let result = service.get_debt(&mut *tx, debt.id).await;
        assert!(matches!(result, Err(AppError::ResourceNotFound(_))));
    }
}
