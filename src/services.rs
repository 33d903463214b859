pub mod auth;
pub mod client_service;
pub mod dashboard_service;
pub mod finance_service;
pub mod jobs;
pub mod notification_service;
pub mod order_service;
pub mod salary_service;
pub mod user_service;
