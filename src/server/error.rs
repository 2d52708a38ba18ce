//! JSON error responses

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::NutriError;

/// Error returned by every handler, rendered as
/// `{"error": {"code", "message", "details"}}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Vec<String>,
}

impl ApiError {
    pub fn storage_disabled() -> Self {
        ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "STORAGE_DISABLED",
            message: "record storage is not configured".to_string(),
            details: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<NutriError> for ApiError {
    fn from(err: NutriError) -> Self {
        let (status, code) = match &err {
            NutriError::MissingFeatures { .. } => (StatusCode::BAD_REQUEST, "MISSING_FEATURES"),
            NutriError::InvalidCategorical { .. } => (StatusCode::BAD_REQUEST, "INVALID_VALUE"),
            NutriError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            NutriError::RecordNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            NutriError::Inference(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INFERENCE_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if err.is_client_error() {
            ApiError {
                status,
                code,
                message: err.to_string(),
                details: err.details(),
            }
        } else {
            log::error!("Request failed: {}", err);
            let message = match code {
                "INFERENCE_ERROR" => "prediction failed",
                _ => "internal server error",
            };
            ApiError {
                status,
                code,
                message: message.to_string(),
                details: Vec::new(),
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: "malformed request body".to_string(),
            details: vec![rejection.body_text()],
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: "invalid path parameter".to_string(),
            details: vec![rejection.body_text()],
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorEnvelope<'a> {
            error: ErrorBody<'a>,
        }

        #[derive(Serialize)]
        struct ErrorBody<'a> {
            code: &'a str,
            message: &'a str,
            details: &'a [String],
        }

        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: &self.message,
                details: &self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
