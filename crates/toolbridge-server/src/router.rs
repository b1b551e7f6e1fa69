use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::app_state::AppState;
use crate::handlers;

/// Create the main application router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Tool discovery for the agent runtime
        .route("/toolsets", get(handlers::list_toolsets))
        .route("/toolsets/{toolset}/tools", post(handlers::get_tools))
        // History trimming before each model call
        .route("/history/trim", post(handlers::trim))
        // CORS: allow any origin (agent runtimes may call from various contexts)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
