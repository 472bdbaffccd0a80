use axum::{
    async_trait,
    body::{to_bytes, Bytes},
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::error::ApiError;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Strict JSON body extractor: one JSON value, bounded size, every failure a 400.
/// Pair with `#[serde(deny_unknown_fields)]` on the target type.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let bytes = to_bytes(req.into_body(), MAX_BODY_BYTES).await.map_err(|_| {
            ApiError::bad_request(format!("body must not be larger than {MAX_BODY_BYTES} bytes"))
        })?;

        decode(&bytes).map(JsonBody)
    }
}

pub fn decode<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, ApiError> {
    let mut values = serde_json::Deserializer::from_slice(bytes).into_iter::<T>();

    let value = match values.next() {
        None => return Err(ApiError::bad_request("body must not be empty")),
        Some(Err(e)) => return Err(describe(e)),
        Some(Ok(value)) => value,
    };

    if values.next().is_some() {
        return Err(ApiError::bad_request("body must only contain a single JSON value"));
    }

    Ok(value)
}

fn describe(err: serde_json::Error) -> ApiError {
    let message = match err.classify() {
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Syntax => format!(
            "body contains badly-formed JSON (at line {}, column {})",
            err.line(),
            err.column()
        ),
        Category::Data => {
            let text = err.to_string();
            match unknown_field(&text) {
                Some(field) => format!("body contains unknown key \"{field}\""),
                None => format!(
                    "body contains incorrect JSON type (at line {}, column {})",
                    err.line(),
                    err.column()
                ),
            }
        }
        Category::Io => "body could not be read".to_string(),
    };
    ApiError::bad_request(message)
}

// serde reports unknown fields as "unknown field `name`, expected ...".
fn unknown_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("unknown field `")?;
    rest.split('`').next()
}
