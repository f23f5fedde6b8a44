use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{achievements, attachments, health, notifications, reports};
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();
    let body_limit = config.api.max_upload_bytes + MULTIPART_OVERHEAD;

    let protected = Router::new()
        .merge(achievement_routes())
        .merge(notification_routes())
        .merge(report_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut router = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .merge(protected)
        .nest_service(attachments::PUBLIC_PREFIX, ServeDir::new(&config.api.upload_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TimeoutLayer::new(config.request_timeout())),
        );

    if let Some(cors) = cors_layer(&config.security) {
        router = router.layer(cors);
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn achievement_routes() -> Router<AppState> {
    Router::new()
        .route("/achievements", get(achievements::list).post(achievements::create))
        .route("/achievements/stats", get(reports::achievement_stats))
        .route(
            "/achievements/:id",
            get(achievements::get)
                .patch(achievements::update)
                .delete(achievements::delete),
        )
        .route("/achievements/:id/attachments", post(attachments::upload))
        .route("/achievements/:id/submit", post(achievements::submit))
        .route("/achievements/:id/verify", post(achievements::verify))
        .route("/achievements/:id/reject", post(achievements::reject))
        .route("/achievements/:id/history", get(achievements::history))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/:id/read", put(notifications::mark_read))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports/statistics", get(reports::statistics))
        .route("/reports/student", get(reports::my_student))
        .route("/reports/student/:id", get(reports::student))
        .route("/reports/lecturer", get(reports::my_lecturer))
        .route("/reports/lecturer/:id", get(reports::lecturer))
}

/// `None` when CORS is disabled. An empty list or `*` allows any origin.
fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
