use axum::{
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use super::ws::ws_handler;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Shared display state
        .route("/brightness", get(handlers::get_brightness))
        .route("/brightness/set", post(handlers::set_brightness))
        .route("/tab", get(handlers::get_tab))
        .route("/tab/set", post(handlers::set_tab))
        .route("/refresh", post(handlers::refresh))
        // Device info
        .route("/config", get(handlers::get_config))
        .route("/snap/status", get(handlers::snap_status))
        .route("/audio/status", get(handlers::audio_status));

    // Display frontend
    let static_files = ServeDir::new(&state.config.web.static_dir);

    Router::new()
        .route("/ws", any(ws_handler))
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes)
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
