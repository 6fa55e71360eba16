use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::unix_now;
use crate::query::{page_count, PageRequest};

/// Success envelope: `{code, success: true, data, message, timestamp}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub success: bool,
    pub data: T,
    pub message: String,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, data, "ok")
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data, "created")
    }

    fn with_status(status: StatusCode, data: T, message: &str) -> Self {
        Self {
            code: status.as_u16(),
            success: true,
            data,
            message: message.to_string(),
            timestamp: unix_now(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub pages: i64,
}

/// Pagination envelope: `{list, pagination: {page, page_size, total, pages}}`.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub list: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(list: Vec<T>, page: PageRequest, total: i64) -> Self {
        Self {
            list,
            pagination: PaginationMeta {
                page: page.page(),
                page_size: page.page_size(),
                total,
                pages: page_count(total, page.page_size()),
            },
        }
    }
}
