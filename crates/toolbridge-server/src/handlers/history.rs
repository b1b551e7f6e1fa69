use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use toolbridge_core::{trim_history, TrimBudget, Turn};

use super::{error_response, json_body};
use crate::app_state::AppState;

/// Request body for trimming an outgoing LLM request's history.
#[derive(Debug, serde::Deserialize)]
pub struct TrimRequest {
    pub contents: Vec<Turn>,
    /// Overrides the configured budget for this request.
    #[serde(default)]
    pub max_previous_user_turns: Option<i64>,
}

/// Trim a conversation history before it is sent to the model.
#[allow(clippy::missing_errors_doc)]
pub async fn trim(
    State(state): State<AppState>,
    payload: Result<Json<TrimRequest>, JsonRejection>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let req = json_body(payload)?;
    let budget = match req.max_previous_user_turns {
        Some(raw) => TrimBudget::try_from(raw).map_err(|e| error_response(&e))?,
        None => state.trim_budget,
    };

    let before = req.contents.len();
    let contents = trim_history(req.contents, budget);
    let trimmed = contents.len() != before;

    Ok(Json(serde_json::json!({
        "contents": contents,
        "trimmed": trimmed,
    })))
}
