use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Top-level JSON object wrapping every successful response, keyed by
/// resource name: `{"movie": {...}}`, `{"movie": [...], "metadata": {...}}`.
#[derive(Debug)]
pub struct Envelope {
    status: StatusCode,
    headers: HeaderMap,
    body: Map<String, Value>,
    failed: Option<String>,
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Map::new(),
            failed: None,
        }
    }

    /// Add `value` under `key`. A serialization failure is remembered and
    /// turns the whole response into a 500.
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.body.insert(key.to_string(), value);
            }
            Err(e) => {
                self.failed.get_or_insert_with(|| format!("serializing \"{key}\": {e}"));
            }
        }
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn created(self) -> Self {
        self.status(StatusCode::CREATED)
    }

    pub fn accepted(self) -> Self {
        self.status(StatusCode::ACCEPTED)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        if let Some(detail) = self.failed {
            return ApiError::server_error(detail).into_response();
        }

        let body = match serde_json::to_vec_pretty(&Value::Object(self.body)) {
            Ok(mut body) => {
                body.push(b'\n');
                body
            }
            Err(e) => return ApiError::server_error(e).into_response(),
        };

        let mut response = (
            self.status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

pub type ApiResult = Result<Envelope, ApiError>;
