pub mod auth;
pub mod catalog;
pub mod clients;
pub mod dashboard;
pub mod finance;
pub mod notifications;
pub mod orders;
pub mod salaries;
