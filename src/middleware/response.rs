use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::types::{Page, Pagination};

fn serialize_or_500<T: Serialize>(data: &T) -> Result<Value, Response> {
    serde_json::to_value(data).map_err(|e| {
        tracing::error!("Failed to serialize response data: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "data": { "message": "Failed to serialize response data" }
            })),
        )
            .into_response()
    })
}

/// `{status:"success", data}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);
        let data = match serialize_or_500(&self.data) {
            Ok(value) => value,
            Err(response) => return response,
        };
        (status, Json(json!({ "status": "success", "data": data }))).into_response()
    }
}

/// `{status:"success", data:[…], pagination:{…}}`
#[derive(Debug)]
pub struct PaginatedResponse<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T: Serialize> From<Page<T>> for PaginatedResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            pagination: page.pagination,
        }
    }
}

impl<T: Serialize> IntoResponse for PaginatedResponse<T> {
    fn into_response(self) -> Response {
        let data = match serialize_or_500(&self.items) {
            Ok(value) => value,
            Err(response) => return response,
        };
        Json(json!({
            "status": "success",
            "data": data,
            "pagination": self.pagination,
        }))
        .into_response()
    }
}

/// Bare `{status:"success"}`
#[derive(Debug, Clone, Copy)]
pub struct EmptyResponse;

impl IntoResponse for EmptyResponse {
    fn into_response(self) -> Response {
        Json(json!({ "status": "success" })).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
