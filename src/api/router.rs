//! Router construction

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, AppState};

/// Build the full axum router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/sessions/:id", delete(handlers::delete_session))
        .route("/api/sessions/:id/submit", post(handlers::submit))
        .route("/api/sessions/:id/view", get(handlers::view))
        .route("/api/sessions/:id/table", get(handlers::table))
        .route("/api/sessions/:id/table.csv", get(handlers::table_csv))
        .route("/api/sessions/:id/chart", get(handlers::chart))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}
