use axum::extract::State;
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::api::{ApiResult, Envelope, JsonBody};
use crate::auth::password;
use crate::database::models::{
    validate_email, validate_token_plaintext, validate_user, TokenScope, User, MOVIE_READ,
};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::mailer::Template;
use crate::routes::AppState;
use crate::validator::Validator;

pub fn activation_ttl() -> Duration {
    Duration::days(3)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterUserInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateUserInput {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResendActivationInput {
    pub email: String,
}

/// POST /v1/users - register a new, unactivated account
///
/// The account, its `movie:read` grant and its activation token are stored
/// together or not at all. The token is mailed in the background; the
/// response does not wait for the mail.
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterUserInput>,
) -> ApiResult {
    let mut v = Validator::new();
    validate_user(&mut v, &input.name, &input.email, &input.password);
    v.finish()?;

    let password_hash = password::hash(&input.password)
        .await
        .map_err(ApiError::server_error)?;

    let mut user = User {
        id: 0,
        created_at: Utc::now(),
        name: input.name,
        email: input.email,
        password_hash,
        activated: false,
        version: 1,
    };

    let token = match state
        .models
        .users
        .register(&mut user, &[MOVIE_READ], activation_ttl())
        .await
    {
        Ok(token) => token,
        Err(DatabaseError::DuplicateEmail) => {
            return Err(ApiError::field(
                "email",
                "a user with this email address already exists",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    let mailer = state.mailer.clone();
    let recipient = user.email.clone();
    let template = Template::UserWelcome {
        name: user.name.clone(),
        user_id: user.id,
        activation_token: token.plaintext,
    };
    state.background.spawn("welcome email", async move {
        mailer.send(&recipient, template).await
    });

    tracing::info!(user_id = user.id, "user registered");
    Ok(Envelope::new().with("user", &user).accepted())
}

/// PUT /v1/users/activated - activate an account with its activation token
pub async fn activate_user(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ActivateUserInput>,
) -> ApiResult {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    v.finish()?;

    let mut user = match state
        .models
        .tokens
        .resolve(TokenScope::Activation, &input.token)
        .await
    {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => {
            return Err(ApiError::field("token", "invalid or expired activation token"))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    state.models.users.update(&mut user).await?;

    state
        .models
        .tokens
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;

    Ok(Envelope::new().with("user", &user))
}

/// POST /v1/users/activation - mail a fresh activation token
pub async fn resend_activation(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ResendActivationInput>,
) -> ApiResult {
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    v.finish()?;

    let user = match state.models.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => {
            return Err(ApiError::field("email", "no matching email address found"))
        }
        Err(e) => return Err(e.into()),
    };

    if user.activated {
        return Err(ApiError::field("email", "user has already been activated"));
    }

    let token = state
        .models
        .tokens
        .new_token(user.id, activation_ttl(), TokenScope::Activation)
        .await?;

    let mailer = state.mailer.clone();
    let template = Template::TokenActivation {
        activation_token: token.plaintext,
    };
    state.background.spawn("activation email", async move {
        mailer.send(&user.email, template).await
    });

    Ok(Envelope::new()
        .with(
            "message",
            "an email will be sent to you containing activation instructions",
        )
        .accepted())
}
