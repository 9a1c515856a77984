use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::error::ApiError;
use crate::types::ApiResponse;

/// An `ApiResponse` envelope paired with the HTTP status to send it with
#[derive(Debug)]
pub struct Reply {
    pub body: ApiResponse,
    pub status_code: Option<StatusCode>,
}

impl Reply {
    /// Status follows the envelope: 200 on success, 400 on a handler-reported failure
    pub fn new(body: ApiResponse) -> Self {
        Self { body, status_code: None }
    }

    /// Create a reply with custom status code
    pub fn with_status(body: ApiResponse, status_code: StatusCode) -> Self {
        Self {
            body,
            status_code: Some(status_code),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(if self.body.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        });

        match serde_json::to_value(&self.body) {
            Ok(value) => (status, Json(value)).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Failed to serialize response data"
                    })),
                )
                    .into_response()
            }
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Reply::new(self).into_response()
    }
}

pub type ApiResult = Result<Reply, ApiError>;
