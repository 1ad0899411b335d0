//! JSON error bodies for HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::error::DeskError;

/// `{error, details?, reconnect?}` with a status mirroring the failure class.
impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self, category = %self.category(), "request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut body = json!({ "error": self.to_string() });
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        if self.requires_reauthentication() {
            body["reconnect"] = json!(true);
        }
        (status, Json(body)).into_response()
    }
}
