// src/db/client_repo.rs

use sqlx::{Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, db::contains_pattern, models::clients::Client};

const CLIENT_COLUMNS: &str = "id, full_name, phone, email, car_model, car_plate, car_vin, \
                              car_year, notes, created_by, created_at, updated_at";

/// Campos graváveis de um cliente (criação e atualização completa).
#[derive(Debug, Clone)]
pub struct ClientFields<'a> {
    pub full_name: &'a str,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
    pub car_model: Option<&'a str>,
    pub car_plate: Option<&'a str>,
    pub car_vin: Option<&'a str>,
    pub car_year: Option<i32>,
    pub notes: Option<&'a str>,
}

// Sem pool próprio: tudo roda na transação RLS aberta pelo handler
#[derive(Clone, Default)]
pub struct ClientRepository;

impl ClientRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_client<'e, E>(
        &self,
        executor: E,
        fields: &ClientFields<'_>,
        created_by: Uuid,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (
                full_name, phone, email, car_model, car_plate, car_vin, car_year, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(fields.full_name)
        .bind(fields.phone)
        .bind(fields.email)
        .bind(fields.car_model)
        .bind(fields.car_plate)
        .bind(fields.car_vin)
        .bind(fields.car_year)
        .bind(fields.notes)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(client)
    }

    pub async fn update_client<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        fields: &ClientFields<'_>,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET full_name = $2, phone = $3, email = $4, car_model = $5, car_plate = $6,
                car_vin = $7, car_year = $8, notes = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.full_name)
        .bind(fields.phone)
        .bind(fields.email)
        .bind(fields.car_model)
        .bind(fields.car_plate)
        .bind(fields.car_vin)
        .bind(fields.car_year)
        .bind(fields.notes)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::ResourceNotFound("Клиент".into()))
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(client)
    }

    /// Busca por nome, telefone ou placa, paginada. Retorna (página, total).
    pub async fn list_clients(
        &self,
        conn: &mut PgConnection,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Client>, i64), AppError> {
        let pattern = search.map(contains_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM clients
            WHERE ($1::text IS NULL
                   OR full_name ILIKE $1 ESCAPE '\' OR phone ILIKE $1 ESCAPE '\'
                   OR car_plate ILIKE $1 ESCAPE '\')
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&mut *conn)
        .await?;

        let clients = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS} FROM clients
            WHERE ($1::text IS NULL
                   OR full_name ILIKE $1 ESCAPE '\' OR phone ILIKE $1 ESCAPE '\'
                   OR car_plate ILIKE $1 ESCAPE '\')
            ORDER BY full_name ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok((clients, total))
    }

    pub async fn delete_client<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::Conflict("У клиента есть непогашенные долги".into());
                    }
                }
                e.into()
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::ResourceNotFound("Клиент".into()));
        }

        Ok(())
    }
}
