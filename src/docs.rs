// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(title = "Autoservice CRM API", description = "Pedidos, clientes, finanças e salários da oficina"),
    paths(
        // --- System ---
        handlers::system::health,

        // --- Auth ---
        handlers::auth::login,
        handlers::auth::oauth_login,
        handlers::auth::request_phone_code,
        handlers::auth::verify_phone_code,
        handlers::auth::logout,
        handlers::auth::get_me,

        // --- Users ---
        handlers::users::list_users,
        handlers::users::list_masters,
        handlers::users::create_user,
        handlers::users::update_user,

        // --- Clients ---
        handlers::clients::list_clients,
        handlers::clients::create_client,
        handlers::clients::get_client,
        handlers::clients::update_client,
        handlers::clients::delete_client,

        // --- Catalog ---
        handlers::catalog::list_services,
        handlers::catalog::create_service,
        handlers::catalog::update_service,
        handlers::catalog::delete_service,

        // --- Orders ---
        handlers::orders::list_orders,
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::update_order,
        handlers::orders::change_status,
        handlers::orders::delete_order,

        // --- Finance ---
        handlers::finance::list_parts_sales,
        handlers::finance::create_parts_sale,
        handlers::finance::get_parts_sale,
        handlers::finance::list_debts,
        handlers::finance::create_debt,
        handlers::finance::get_debt,
        handlers::finance::list_payments,
        handlers::finance::create_payment,

        // --- Salaries ---
        handlers::salaries::list_salaries,
        handlers::salaries::list_weekly_totals,
        handlers::salaries::recalculate_week,
        handlers::salaries::list_bonuses,
        handlers::salaries::create_bonus,
        handlers::salaries::delete_bonus,

        // --- Notifications ---
        handlers::notifications::list_notifications,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,

        // --- Dashboard ---
        handlers::dashboard::get_summary,
        handlers::dashboard::list_snapshots,
    ),
    components(
        schemas(
            handlers::system::HealthStatus,

            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::OAuthLoginPayload,
            models::auth::PhoneCodeRequestPayload,
            models::auth::PhoneCodeVerifyPayload,
            models::auth::AuthResponse,
            models::auth::CreateUserPayload,
            models::auth::UpdateUserPayload,

            // --- Clients / Catalog ---
            models::clients::Client,
            models::clients::ClientPayload,
            models::catalog::CatalogItem,
            models::catalog::CreateCatalogItemPayload,
            models::catalog::UpdateCatalogItemPayload,

            // --- Orders ---
            models::orders::OrderStatus,
            models::orders::ServiceLine,
            models::orders::Order,
            models::orders::OrderMaster,
            models::orders::MasterShare,
            models::orders::OrderDetail,
            models::orders::CreateOrderPayload,
            models::orders::UpdateOrderPayload,
            models::orders::ChangeStatusPayload,

            // --- Finance ---
            models::finance::PaymentType,
            models::finance::PartLine,
            models::finance::PartsSale,
            models::finance::Debt,
            models::finance::Payment,
            models::finance::PaymentReceipt,
            models::finance::CreatePartsSalePayload,
            models::finance::CreateDebtPayload,
            models::finance::CreatePaymentPayload,

            // --- Salaries ---
            models::salaries::Salary,
            models::salaries::WeeklySalaryTotal,
            models::salaries::Bonus,
            models::salaries::WeeklyRecalculation,
            models::salaries::CreateBonusPayload,

            // --- Notifications / Dashboard ---
            models::notifications::Notification,
            models::dashboard::StatusCount,
            models::dashboard::DashboardSummary,
            models::dashboard::StatisticsSnapshot,
        )
    ),
    tags(
        (name = "System", description = "Saúde do serviço"),
        (name = "Auth", description = "Login por senha, telefone ou OAuth"),
        (name = "Users", description = "Equipe da oficina"),
        (name = "Clients", description = "Clientes e seus carros"),
        (name = "Catalog", description = "Catálogo de serviços"),
        (name = "Orders", description = "Pedidos de serviço e atribuição de masters"),
        (name = "Finance", description = "Vendas de peças, dívidas e pagamentos"),
        (name = "Salaries", description = "Comissões, totais semanais e bônus"),
        (name = "Notifications", description = "Avisos para os masters"),
        (name = "Dashboard", description = "Indicadores gerenciais")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_core_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in ["/api/health", "/api/orders", "/api/orders/{id}/status", "/api/payments"] {
            assert!(doc.paths.paths.contains_key(path), "faltando {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
