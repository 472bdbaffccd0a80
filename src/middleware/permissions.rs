use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::auth::Identity;
use crate::database::models::{PermissionStore, User};
use crate::error::ApiError;

/// Rejects anonymous callers (401) and unactivated accounts (403).
pub async fn require_authenticated(
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    ensure_activated(&identity)?;
    Ok(next.run(request).await)
}

/// The activated user behind `identity`, or the matching rejection.
pub fn ensure_activated(identity: &Identity) -> Result<&User, ApiError> {
    let user = identity.user().ok_or(ApiError::AuthenticationRequired)?;
    if !user.activated {
        tracing::debug!(user_id = user.id, "rejected request from unactivated account");
        return Err(ApiError::InactiveAccount);
    }
    Ok(user)
}

/// Route-layer state naming the permission code a route group requires.
#[derive(Clone)]
pub struct PermissionGate {
    pub permissions: Arc<dyn PermissionStore>,
    pub code: &'static str,
}

impl PermissionGate {
    pub fn new(permissions: Arc<dyn PermissionStore>, code: &'static str) -> Self {
        Self { permissions, code }
    }
}

pub async fn require_permission(
    State(gate): State<PermissionGate>,
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&identity, gate.code, gate.permissions.as_ref()).await?;
    Ok(next.run(request).await)
}

/// Activation is checked before the permission store is consulted.
pub async fn authorize(
    identity: &Identity,
    code: &str,
    permissions: &dyn PermissionStore,
) -> Result<(), ApiError> {
    let user = ensure_activated(identity)?;

    let held = permissions.get_all_for_user(user.id).await?;
    if !held.includes(code) {
        tracing::warn!(user_id = user.id, permission = code, "permission denied");
        return Err(ApiError::NotPermitted);
    }

    Ok(())
}
