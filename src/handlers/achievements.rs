use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::{
    AchievementReference, AchievementStatus, AchievementUpdate, NewAchievement, ReferenceFilter, SortField,
    SortOrder,
};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, EmptyResponse, PaginatedResponse};
use crate::services::{AchievementView, HistoryEntry, ListQuery};
use crate::state::AppState;
use crate::types::PageRequest;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Admin only
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<ListQuery, ApiError> {
        let status = match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<AchievementStatus>().map_err(ApiError::bad_request)?),
            None => None,
        };
        Ok(ListQuery {
            page: PageRequest::new(self.page, self.limit),
            filter: ReferenceFilter {
                status,
                sort_by: SortField::from_param(self.sort_by.as_deref()),
                sort_order: SortOrder::from_param(self.sort_order.as_deref()),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    #[serde(default, alias = "note", alias = "rejectionNote")]
    pub rejection_note: String,
}

/// POST /achievements - Create a draft for the calling student
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<NewAchievement>, JsonRejection>,
) -> ApiResult<AchievementView> {
    let Json(payload) = payload?;
    let (document, reference) = state.services.achievements.create(auth.actor(), payload).await?;
    Ok(ApiResponse::success(AchievementView::new(document, &reference)))
}

/// GET /achievements - Role-routed listing
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<PaginatedResponse<AchievementView>, ApiError> {
    let Query(params) = params?;
    let page = state.services.achievements.list(auth.actor(), params.into_query()?).await?;
    Ok(page.into())
}

/// GET /achievements/:id - Joined document and workflow view
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<AchievementView> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.services.achievements.get(auth.actor(), &id).await?))
}

/// PATCH /achievements/:id - Partial update of a draft
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<AchievementUpdate>, JsonRejection>,
) -> ApiResult<AchievementView> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let view = state.services.achievements.update(auth.actor(), &id, payload).await?;
    Ok(ApiResponse::success(view))
}

/// DELETE /achievements/:id - Soft delete of a draft
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
) -> Result<EmptyResponse, ApiError> {
    let Path(id) = id?;
    state.services.achievements.delete(auth.actor(), &id).await?;
    Ok(EmptyResponse)
}

/// POST /achievements/:id/submit
pub async fn submit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<AchievementReference> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.services.achievements.submit(auth.actor(), &id).await?))
}

/// POST /achievements/:id/verify
pub async fn verify(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<AchievementReference> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.services.achievements.verify(auth.actor(), &id).await?))
}

/// POST /achievements/:id/reject - Body `{rejection_note}`
pub async fn reject(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<RejectBody>, JsonRejection>,
) -> ApiResult<AchievementReference> {
    let Path(id) = id?;
    let Json(body) = payload?;
    let reference = state
        .services
        .achievements
        .reject(auth.actor(), &id, &body.rejection_note)
        .await?;
    Ok(ApiResponse::success(reference))
}

/// GET /achievements/:id/history
pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Vec<HistoryEntry>> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.services.achievements.history(auth.actor(), &id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_reject_unknown_status() {
        let params = ListParams {
            status: Some("archived".to_string()),
            ..Default::default()
        };
        assert!(params.into_query().is_err());
    }

    #[test]
    fn list_params_default_sort_and_clamp() {
        let params = ListParams {
            page: Some(0),
            limit: Some(500),
            sort_by: Some("points".to_string()),
            ..Default::default()
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.page, PageRequest { page: 1, limit: 100 });
        assert_eq!(query.filter.sort_by, SortField::CreatedAt);
        assert_eq!(query.filter.sort_order, SortOrder::Desc);
        assert!(query.filter.status.is_none());
    }
}
