// src/services/notification_service.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{Paginated, PaginationQuery},
    },
    db::NotificationRepository,
    models::notifications::Notification,
};

pub(crate) fn assignment_message(order_number: &str, percentage: Decimal) -> (String, String) {
    (
        "Новый заказ".to_string(),
        format!("Вы назначены на заказ {} ({}%)", order_number, percentage.normalize()),
    )
}

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository) -> Self {
        Self { repo }
    }

    pub async fn notify_assignment<'e, E>(
        &self,
        executor: E,
        master_id: Uuid,
        order_id: Uuid,
        order_number: &str,
        percentage: Decimal,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (title, body) = assignment_message(order_number, percentage);
        self.repo.create(executor, master_id, &title, &body, Some(order_id)).await
    }

    pub async fn list_for_user(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        unread_only: bool,
        pagination: &PaginationQuery,
    ) -> Result<Paginated<Notification>, AppError> {
        let (items, total) = self
            .repo
            .list_for_user(conn, user_id, unread_only, pagination.limit(), pagination.offset())
            .await?;

        Ok(Paginated::new(items, pagination, total))
    }

    pub async fn mark_read<'e, E>(&self, executor: E, id: Uuid, user_id: Uuid) -> Result<Notification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.mark_read(executor, id, user_id).await
    }

    pub async fn mark_all_read<'e, E>(&self, executor: E, user_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.mark_all_read(executor, user_id).await
    }

    pub async fn cleanup<'e, E>(&self, executor: E, retention_days: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let removed = self.repo.delete_older_than(executor, retention_days).await?;
        if removed > 0 {
            tracing::info!(removed, retention_days, "🧹 Notificações antigas removidas");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_message_names_order_and_share() {
        let (title, body) = assignment_message("ZA014", "60.00".parse().unwrap());
        assert_eq!(title, "Новый заказ");
        assert_eq!(body, "Вы назначены на заказ ZA014 (60%)");
    }

    #[test]
    fn fractional_share_keeps_its_decimals() {
        let (_, body) = assignment_message("ZA100", "33.50".parse().unwrap());
        assert!(body.ends_with("(33.5%)"));
    }
}
