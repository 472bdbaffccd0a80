// HTTP API Error Types
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::database::DatabaseError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    InvalidAuthenticationHeader,
    InvalidAuthenticationToken,
    InvalidCredentials,
    AuthenticationRequired,

    // 403 Forbidden
    InactiveAccount,
    NotPermitted,

    // 404 Not Found
    NotFound,

    // 405 Method Not Allowed
    MethodNotAllowed(Method),

    // 409 Conflict
    EditConflict,

    // 422 Unprocessable Entity
    FailedValidation(BTreeMap<String, String>),

    // 500 Internal Server Error, detail is logged and never sent
    ServerError(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidAuthenticationHeader
            | ApiError::InvalidAuthenticationToken
            | ApiError::InvalidCredentials
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::InvalidAuthenticationHeader => "invalid authentication header".to_string(),
            ApiError::InvalidAuthenticationToken => {
                "invalid or missing authentication token".to_string()
            }
            ApiError::InvalidCredentials => "invalid authentication credentials".to_string(),
            ApiError::AuthenticationRequired => {
                "you must be authenticated to access this resource".to_string()
            }
            ApiError::InactiveAccount => {
                "your user account must be activated to access this resource".to_string()
            }
            ApiError::NotPermitted => {
                "your user account doesn't have the necessary permissions to access this resource"
                    .to_string()
            }
            ApiError::NotFound => "the requested resource could not be found".to_string(),
            ApiError::MethodNotAllowed(method) => {
                format!("the {} method is not supported for this resource", method)
            }
            ApiError::EditConflict => {
                "unable to update the record due to an edit conflict, please try again".to_string()
            }
            ApiError::FailedValidation(_) => "failed validation".to_string(),
            ApiError::ServerError(_) => {
                "the server encountered a problem and could not process your request".to_string()
            }
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::FailedValidation(errors) => json!({ "error": errors }),
            _ => json!({ "error": self.message() }),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn failed_validation(errors: BTreeMap<String, String>) -> Self {
        ApiError::FailedValidation(errors)
    }

    /// Single-field 422, for checks that only make sense after a store lookup.
    pub fn field(key: &str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(key.to_string(), message.into());
        ApiError::FailedValidation(errors)
    }

    pub fn server_error(detail: impl std::fmt::Display) -> Self {
        ApiError::ServerError(detail.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => ApiError::NotFound,
            DatabaseError::EditConflict => ApiError::EditConflict,
            other => ApiError::ServerError(other.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::ServerError(detail) => write!(f, "server error: {}", detail),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let ApiError::ServerError(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }

        let body = match serde_json::to_vec(&self.to_json()) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to serialize error response: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut response = (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response();

        if matches!(
            self,
            ApiError::InvalidAuthenticationHeader | ApiError::InvalidAuthenticationToken
        ) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
