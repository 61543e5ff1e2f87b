//! HTTP response bodies
//!
//! Shapes of the JSON bodies returned by the report endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{CoreError, ReportId};

/// Body returned for an accepted report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportAccepted {
    pub status: String,
    pub id: ReportId,
    /// The payload as it was received
    pub received: Value,
}

impl ReportAccepted {
    pub fn new(id: ReportId, received: Value) -> Self {
        Self {
            status: "success".to_string(),
            id,
            received,
        }
    }
}

/// Error body with its HTTP status
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    pub code: u16,
    pub status: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(400, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_code(500, message)
    }

    fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_core_errors_map_to_status_codes() {
        assert_eq!(ApiError::from(CoreError::Validation("count".into())).code, 400);
        assert_eq!(ApiError::from(CoreError::Storage("locked".into())).code, 500);
        assert_eq!(ApiError::from(CoreError::Internal("join".into())).code, 500);
    }

    #[test]
    fn test_error_body_omits_code() {
        let body = serde_json::to_value(ApiError::bad_request("Missing field 'count'")).unwrap();
        assert_eq!(
            body,
            json!({"status": "error", "message": "Missing field 'count'"})
        );
    }

    #[test]
    fn test_accepted_body_echoes_payload() {
        let payload = json!({"timestamp": "14:00", "count": 3});
        let body = serde_json::to_value(ReportAccepted::new(7, payload.clone())).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["id"], 7);
        assert_eq!(body["received"], payload);
    }
}
