// src/services/client_service.rs

use sqlx::{Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{Paginated, PaginationQuery},
    },
    db::{client_repo::ClientFields, ClientRepository},
    middleware::rbac::ensure_owner_or_management,
    models::{
        auth::User,
        clients::{Client, ClientPayload},
    },
};

/// Campo opcional vazio ("   ") é gravado como NULL.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn fields_from(payload: &ClientPayload) -> ClientFields<'_> {
    ClientFields {
        full_name: payload.full_name.trim(),
        phone: non_empty(&payload.phone),
        email: non_empty(&payload.email),
        car_model: non_empty(&payload.car_model),
        car_plate: non_empty(&payload.car_plate),
        car_vin: non_empty(&payload.car_vin),
        car_year: payload.car_year,
        notes: non_empty(&payload.notes),
    }
}

#[derive(Clone)]
pub struct ClientService {
    repo: ClientRepository,
}

impl ClientService {
    pub fn new(repo: ClientRepository) -> Self {
        Self { repo }
    }

    pub async fn list_clients(
        &self,
        conn: &mut PgConnection,
        search: Option<&str>,
        pagination: &PaginationQuery,
    ) -> Result<Paginated<Client>, AppError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let (items, total) = self
            .repo
            .list_clients(conn, search, pagination.limit(), pagination.offset())
            .await?;

        Ok(Paginated::new(items, pagination, total))
    }

    pub async fn get_client<'e, E>(&self, executor: E, id: Uuid) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_by_id(executor, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Клиент".into()))
    }

    pub async fn create_client<'e, E>(
        &self,
        executor: E,
        actor: &User,
        payload: &ClientPayload,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = self.repo.create_client(executor, &fields_from(payload), actor.id).await?;
        tracing::info!(client_id = %client.id, "Cliente cadastrado");
        Ok(client)
    }

    /// Master só edita clientes que ele mesmo cadastrou.
    pub async fn update_client(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        id: Uuid,
        payload: &ClientPayload,
    ) -> Result<Client, AppError> {
        let current = self.get_client(&mut *conn, id).await?;
        ensure_owner_or_management(actor, current.created_by)?;

        self.repo.update_client(&mut *conn, id, &fields_from(payload)).await
    }

    pub async fn delete_client<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.delete_client(executor, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_fields_become_null() {
        assert_eq!(non_empty(&Some("   ".into())), None);
        assert_eq!(non_empty(&None), None);
        assert_eq!(non_empty(&Some(" А123ВС77 ".into())), Some("А123ВС77"));
    }

    #[test]
    fn payload_fields_are_trimmed() {
        let payload = ClientPayload {
            full_name: "  Сергей Иванов ".into(),
            phone: Some("+79161234567".into()),
            email: Some(String::new()),
            car_model: Some("Toyota Camry".into()),
            car_plate: None,
            car_vin: None,
            car_year: Some(2018),
            notes: None,
        };

        let fields = fields_from(&payload);
        assert_eq!(fields.full_name, "Сергей Иванов");
        assert_eq!(fields.email, None);
        assert_eq!(fields.car_year, Some(2018));
    }
}
