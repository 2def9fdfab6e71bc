//! HTTP error responses
//!
//! Every error is rendered as `{"error": {"message", "type"}}`; rule-level
//! policy errors also carry the offending `rule`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::security::SecurityError;

#[derive(Debug)]
pub enum AppError {
    /// Malformed or empty query body
    InvalidRequest { status: StatusCode, message: String },

    /// Policy update body that does not describe a rule list
    InvalidPolicy(String),

    /// Error raised by the policy engine
    Engine(promptwall_core::Error),

    Unauthorized(SecurityError),

    NotFound(String),

    Internal(String),
}

impl From<promptwall_core::Error> for AppError {
    fn from(err: promptwall_core::Error) -> Self {
        AppError::Engine(err)
    }
}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        AppError::Unauthorized(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest {
            status: client_status(rejection.status()),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest {
            status: client_status(rejection.status()),
            message: rejection.body_text(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}

// Deserialization failures are reported as plain bad requests
fn client_status(status: StatusCode) -> StatusCode {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        StatusCode::BAD_REQUEST
    } else {
        status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message, rule) = match self {
            AppError::InvalidRequest { status, message } => {
                (status, "invalid_request_error", message, None)
            }
            AppError::InvalidPolicy(message) => {
                (StatusCode::BAD_REQUEST, "validation_error", message, None)
            }
            AppError::Engine(err) if err.is_client_error() => {
                let rule = err.rule_name().map(str::to_string);
                let message = match &err {
                    promptwall_core::Error::InvalidRequest(msg) => msg.clone(),
                    other => other.to_string(),
                };
                (StatusCode::BAD_REQUEST, err.kind(), message, rule)
            }
            AppError::Engine(err) => {
                error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Unauthorized(err) => {
                let body = json!({
                    "error": {
                        "message": err.to_string(),
                        "type": "authentication_error",
                    }
                });
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    Json(body),
                )
                    .into_response();
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found_error", message, None),
            AppError::Internal(message) => {
                error!(error = %message, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": {
                "message": message,
                "type": kind,
            }
        });
        if let Some(rule) = rule {
            body["error"]["rule"] = json!(rule);
        }

        (status, Json(body)).into_response()
    }
}
