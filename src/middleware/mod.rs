pub mod auth;
pub mod permissions;

pub use auth::{authenticate, Identity};
pub use permissions::{require_authenticated, require_permission, PermissionGate};
