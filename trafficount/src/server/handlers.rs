//! Request handlers
//!
//! Store access is blocking, so every handler hops onto the blocking pool
//! before touching the database.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde_json::Value;
use tracing::{error, warn};

use super::dto::{ApiError, ReportAccepted};
use super::ServerState;
use crate::core::{CoreError, CoreResult, HistoryEntry};

async fn blocking<T, F>(f: F) -> CoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Internal(format!("Request worker failed: {}", e)))?
}

fn log_failure(err: &CoreError) {
    if err.is_client_error() {
        warn!("Rejected request: {}", err);
    } else {
        error!("Request failed: {}", err);
    }
}

/// `POST /api/report`
pub async fn submit_report(
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ReportAccepted>), ApiError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejected non-JSON report body: {}", e);
        ApiError::bad_request("Invalid data: request body must be a JSON object")
    })?;

    let ingest = state.ingest.clone();
    let received = payload.clone();
    let stored = blocking(move || ingest.submit(&payload))
        .await
        .map_err(|e| {
            log_failure(&e);
            ApiError::from(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ReportAccepted::new(stored.id, received)),
    ))
}

/// `GET /api/traffic`
pub async fn list_traffic(
    State(state): State<ServerState>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let query = state.query.clone();
    let history = blocking(move || query.list_all()).await.map_err(|e| {
        log_failure(&e);
        ApiError::from(e)
    })?;
    Ok(Json(history))
}

/// `GET /`
pub async fn index(State(state): State<ServerState>) -> impl IntoResponse {
    Html(render_index(
        &state.info.location_name,
        &state.info.timezone,
    ))
}

fn render_index(location: &str, timezone: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Traffic counts</title></head>\n\
         <body>\n<h1>Traffic counts</h1>\n<p>Location: {}</p>\n<p>Time zone: {}</p>\n\
         <p>History: <a href=\"/api/traffic\">/api/traffic</a></p>\n</body>\n</html>\n",
        escape_html(location),
        escape_html(timezone)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
