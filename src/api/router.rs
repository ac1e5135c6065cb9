use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::Engine;

use super::handlers;

/// Create the HTTP router with all endpoints. The engine is the shared
/// state: handlers borrow it, nothing global.
pub fn create_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/search", get(handlers::search))
        .route("/suggest", get(handlers::suggest))
        .route("/reload", post(handlers::reload))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
