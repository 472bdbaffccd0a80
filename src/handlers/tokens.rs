use axum::extract::State;
use chrono::Duration;
use serde::Deserialize;

use crate::api::{ApiResult, Envelope, JsonBody};
use crate::auth::password;
use crate::database::models::{validate_email, validate_password_plaintext, TokenScope};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::routes::AppState;
use crate::validator::Validator;

pub fn authentication_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsInput {
    pub email: String,
    pub password: String,
}

/// POST /v1/users/authentication - exchange credentials for a bearer token
///
/// Unknown email and wrong password produce the same 401.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> ApiResult {
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    v.finish()?;

    let user = match state.models.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    let matches = password::matches(&input.password, &user.password_hash)
        .await
        .map_err(ApiError::server_error)?;
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .models
        .tokens
        .new_token(user.id, authentication_ttl(), TokenScope::Authentication)
        .await?;

    Ok(Envelope::new()
        .with("authentication_token", &token)
        .created())
}

/// DELETE /v1/users/authentication - revoke every bearer token of the caller
pub async fn delete_authentication_tokens(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult {
    let user = identity.user().ok_or(ApiError::AuthenticationRequired)?;

    state
        .models
        .tokens
        .delete_all_for_user(TokenScope::Authentication, user.id)
        .await?;

    Ok(Envelope::new().with("message", "you have been logged out"))
}
