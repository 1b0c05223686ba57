use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::api::rest::{
    handlers, logging_middleware::request_logging_middleware, state::AppState,
};

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let analyze_routes = Router::new()
        .route("/", post(handlers::analyze::analyze))
        .route("/api/analyze", post(handlers::analyze::analyze))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    let public_routes = Router::new()
        .route("/health", get(handlers::analyze::health))
        .route("/version", get(handlers::analyze::version));

    Router::new()
        .merge(analyze_routes)
        .merge(public_routes)
        .with_state(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
}
