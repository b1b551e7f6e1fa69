use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app_state::AppState;

/// Liveness check. Never touches upstream servers.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "toolsets": state.toolsets.len(),
    }))
}
