// src/db/catalog_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::catalog::CatalogItem};

const CATALOG_COLUMNS: &str = "id, name, default_price, is_active, created_at, updated_at";

#[derive(Clone, Default)]
pub struct CatalogRepository;

impl CatalogRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn list<'e, E>(&self, executor: E, include_inactive: bool) -> Result<Vec<CatalogItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, CatalogItem>(&format!(
            "SELECT {CATALOG_COLUMNS} FROM services WHERE ($1 OR is_active) ORDER BY name ASC"
        ))
        .bind(include_inactive)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        name: &str,
        default_price: Decimal,
    ) -> Result<CatalogItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, CatalogItem>(&format!(
            "INSERT INTO services (name, default_price) VALUES ($1, $2) RETURNING {CATALOG_COLUMNS}"
        ))
        .bind(name)
        .bind(default_price)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            // Tratamento de erro de chave duplicada
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(format!("Услуга «{}» уже есть в каталоге", name));
                }
            }
            e.into()
        })
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        default_price: Option<Decimal>,
        is_active: Option<bool>,
    ) -> Result<CatalogItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, CatalogItem>(&format!(
            r#"
            UPDATE services
            SET name = COALESCE($2, name),
                default_price = COALESCE($3, default_price),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATALOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(default_price)
        .bind(is_active)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::ResourceNotFound("Услуга".into()))
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Linhas de pedido guardam nome e preço copiados, então pode apagar
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ResourceNotFound("Услуга".into()));
        }

        Ok(())
    }
}
