use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use toolbridge_core::{SelectionContext, ToolSetId};

use super::{error_response, json_body};
use crate::app_state::AppState;

/// Request body for fetching a toolset's tools.
#[derive(Debug, Default, Deserialize)]
pub struct GetToolsRequest {
    #[serde(default)]
    pub context: Option<SelectionContext>,
}

/// One row of `GET /toolsets`.
#[derive(Debug, Serialize)]
pub struct ToolsetSummary {
    pub id: ToolSetId,
    pub upstream: String,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
}

/// List configured toolsets and their cache state.
pub async fn list_toolsets(State(state): State<AppState>) -> Json<Value> {
    let mut cached: BTreeMap<_, _> = state.cache.entries().await.into_iter().collect();
    let toolsets: Vec<_> = state
        .toolsets
        .iter()
        .map(|(id, toolset)| {
            let entry = cached.remove(id);
            ToolsetSummary {
                id: id.clone(),
                upstream: toolset.upstream.clone(),
                cached: entry.is_some(),
                tool_count: entry.as_ref().map(|entry| entry.tools.len()),
                discovered_at: entry.map(|entry| entry.discovered_at),
            }
        })
        .collect();

    Json(serde_json::json!({ "toolsets": toolsets }))
}

/// Tools of one toolset, discovered on first use and cached afterwards.
#[allow(clippy::missing_errors_doc)]
pub async fn get_tools(
    State(state): State<AppState>,
    Path(toolset): Path<String>,
    payload: Result<Json<GetToolsRequest>, JsonRejection>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let req = json_body(payload)?;
    let id = ToolSetId(toolset);
    let toolset = state.toolset(&id).map_err(|e| error_response(&e))?;

    let tools = toolset
        .session
        .get_tools(req.context.as_ref())
        .await
        .map_err(|e| {
            tracing::warn!(toolset = %id, "Tool discovery failed: {e}");
            error_response(&e)
        })?;

    Ok(Json(serde_json::json!({
        "toolset": id,
        "tools": &*tools,
    })))
}
