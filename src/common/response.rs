// src/common/response.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Envelope padrão de sucesso: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data, status: StatusCode::OK }
    }

    pub fn created(data: T) -> Self {
        Self { success: true, data, status: StatusCode::CREATED }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE: i64 = 1_000_000;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Clone, Copy, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, max = 1_000_000, message = "Номер страницы должен быть от 1 до 1000000"))]
    pub page: i64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "Лимит должен быть от 1 до 100"))]
    pub limit: i64,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self { page: default_page(), limit: default_limit() }
    }
}

impl PaginationQuery {
    pub fn offset(&self) -> i64 {
        (self.page.clamp(1, MAX_PAGE) - 1) * self.limit()
    }

    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, query: &PaginationQuery, total: i64) -> Self {
        let limit = query.limit();
        let pages = if total <= 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            items,
            pagination: PaginationMeta { page: query.page.clamp(1, MAX_PAGE), limit, total, pages },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_up() {
        let query = PaginationQuery { page: 2, limit: 20 };
        let page = Paginated::new(vec![1, 2, 3], &query, 41);
        assert_eq!(page.pagination.pages, 3);
        assert_eq!(page.pagination.total, 41);
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let page: Paginated<i32> = Paginated::new(vec![], &PaginationQuery::default(), 0);
        assert_eq!(page.pagination.pages, 0);
        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn oversized_limit_is_clamped() {
        let query = PaginationQuery { page: 1, limit: 5000 };
        assert_eq!(query.limit(), MAX_PAGE_LIMIT);
        assert!(query.validate().is_err());
    }

    #[test]
    fn huge_page_is_rejected_and_offset_stays_bounded() {
        let query = PaginationQuery { page: i64::MAX, limit: 100 };
        assert!(query.validate().is_err());
        assert_eq!(query.offset(), (MAX_PAGE - 1) * 100);

        let last = PaginationQuery { page: MAX_PAGE, limit: 100 };
        assert!(last.validate().is_ok());
    }

    #[test]
    fn envelope_serializes_success_flag() {
        let body = serde_json::to_value(ApiResponse::ok(vec!["a"])).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": ["a"] }));
    }
}
