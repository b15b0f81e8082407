//! Axum router setup for the callvis server

use std::sync::Arc;

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{clear_cache, exchange_options, get_artifact, get_description, health_check, trigger_render},
    ServerState,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Option exchange and render trigger
        .route("/options", get(exchange_options))
        .route("/render", get(trigger_render))
        // Latest artifact
        .route("/artifact", get(get_artifact))
        .route("/artifact/gv", get(get_description))
        .route("/cache", delete(clear_cache))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
