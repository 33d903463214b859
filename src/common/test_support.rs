// src/common/test_support.rs

//! Utilidades dos testes que rodam contra o Postgres (`#[sqlx::test]`).

use chrono::FixedOffset;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::db_utils::set_rls_context,
    db::{NotificationRepository, OrderRepository, SalaryRepository, UserRepository},
    models::auth::{User, UserRole},
    services::{
        notification_service::NotificationService, order_service::OrderService,
        salary_service::SalaryService,
    },
};

pub async fn create_user(pool: &PgPool, role: UserRole) -> User {
    let email = format!("{}@oficina.test", Uuid::new_v4());
    UserRepository::new(pool.clone())
        .create_user("Тестовый сотрудник", Some(&email), None, None, role)
        .await
        .unwrap()
}

pub async fn create_client(pool: &PgPool) -> Uuid {
    sqlx::query_scalar("INSERT INTO clients (full_name, car_plate) VALUES ('Сергей Иванов', 'А123ВС77') RETURNING id")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Transação com o mesmo contexto RLS que um request do `user` teria.
pub async fn rls_tx(pool: &PgPool, user: &User) -> Transaction<'static, Postgres> {
    let mut tx = pool.begin().await.unwrap();
    set_rls_context(&mut tx, Some(&user.id.to_string()), user.role.as_str())
        .await
        .unwrap();
    tx
}

pub fn salary_service() -> SalaryService {
    SalaryService::new(SalaryRepository::new(), FixedOffset::east_opt(3 * 3600).unwrap())
}

pub fn order_service(pool: &PgPool) -> OrderService {
    OrderService::new(
        OrderRepository::new(),
        UserRepository::new(pool.clone()),
        NotificationService::new(NotificationRepository::new()),
        salary_service(),
        "ZA".into(),
    )
}
