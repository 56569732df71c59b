/**
 * Error Conversion
 *
 * Implements `IntoResponse` for `ApiError` so handlers can return it
 * directly. Errors are serialized into the standard response envelope:
 *
 * ```json
 * { "success": false, "message": "Task not found" }
 * ```
 */

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::types::ApiError;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:?}", self);
        } else {
            tracing::debug!("request rejected ({}): {}", status, message);
        }

        let body = serde_json::json!({
            "success": false,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
