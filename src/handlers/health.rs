use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - Service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": {
            "name": "Achievement API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Student achievement reporting and verification",
            "endpoints": {
                "achievements": "/achievements[/:id[/submit|/verify|/reject|/history|/attachments]] (protected)",
                "stats": "/achievements/stats (protected)",
                "notifications": "/notifications[/unread-count|/read-all|/:id/read] (protected)",
                "reports": "/reports/statistics, /reports/student[/:id], /reports/lecturer[/:id] (protected)",
                "health": "/health (public)"
            }
        }
    }))
}

/// GET /health - Pings both stores
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let (documents, references) = tokio::join!(state.documents.ping(), state.references.ping());

    let describe = |result: &Result<(), crate::database::DatabaseError>| match result {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    };
    let body = json!({
        "timestamp": now,
        "document_store": describe(&documents),
        "reference_store": describe(&references),
    });

    if documents.is_ok() && references.is_ok() {
        (StatusCode::OK, Json(json!({ "status": "success", "data": body })))
    } else {
        tracing::warn!(?documents, ?references, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "data": { "message": "store unavailable", "checks": body }
            })),
        )
    }
}
