use axum::{
    extract::{rejection::PathRejection, Path, State},
    Extension,
};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::report_service::{AchievementStats, LecturerReport, Statistics, StudentReport};
use crate::state::AppState;

/// GET /achievements/stats - `{total, verified, percentage}` in the caller's scope
pub async fn achievement_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<AchievementStats> {
    Ok(ApiResponse::success(state.services.reports.achievement_stats(auth.actor()).await?))
}

/// GET /reports/statistics
pub async fn statistics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Statistics> {
    Ok(ApiResponse::success(state.services.reports.statistics(auth.actor()).await?))
}

/// GET /reports/student/:id
pub async fn student(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StudentReport> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.services.reports.student_report(auth.actor(), id).await?))
}

/// GET /reports/student - Calling student's own report
pub async fn my_student(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<StudentReport> {
    Ok(ApiResponse::success(state.services.reports.my_student_report(auth.actor()).await?))
}

/// GET /reports/lecturer/:id
pub async fn lecturer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<LecturerReport> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.services.reports.lecturer_report(auth.actor(), id).await?))
}

/// GET /reports/lecturer - Calling advisor's own report
pub async fn my_lecturer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<LecturerReport> {
    Ok(ApiResponse::success(state.services.reports.my_lecturer_report(auth.actor()).await?))
}
