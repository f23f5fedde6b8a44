use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension,
};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::Notification;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, PaginatedResponse};
use crate::state::AppState;
use crate::types::PageQuery;

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// GET /notifications - Caller's inbox, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<PaginatedResponse<Notification>, ApiError> {
    let Query(query) = query?;
    let page = state.services.notifications.list(auth.user_id, query.into()).await?;
    Ok(page.into())
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<UnreadCount> {
    let count = state.services.notifications.unread_count(auth.user_id).await?;
    Ok(ApiResponse::success(UnreadCount { count }))
}

/// PUT /notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Notification> {
    let Path(id) = id?;
    Ok(ApiResponse::success(
        state.services.notifications.mark_read(id, auth.user_id).await?,
    ))
}

/// PUT /notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<MarkedRead> {
    let updated = state.services.notifications.mark_all_read(auth.user_id).await?;
    Ok(ApiResponse::success(MarkedRead { updated }))
}
