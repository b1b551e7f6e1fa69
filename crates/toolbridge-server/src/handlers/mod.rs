mod health;
mod history;
mod toolsets;

use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};

use toolbridge_core::Error;

pub use health::health;
pub use history::trim;
pub use toolsets::{get_tools, list_toolsets};

/// Map a core error onto an HTTP status and message.
fn error_response(err: &Error) -> (StatusCode, String) {
    let status = match err {
        Error::ToolsetNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::SessionClosed(_)
        | Error::Transport(_)
        | Error::Upstream(_)
        | Error::InvalidSchema { .. } => StatusCode::BAD_GATEWAY,
        Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Unwrap a JSON body, reporting malformed or mistyped bodies as invalid
/// input.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, (StatusCode, String)> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| error_response(&Error::InvalidInput(rejection.body_text())))
}
