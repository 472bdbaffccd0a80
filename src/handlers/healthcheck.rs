use axum::extract::State;
use serde::Serialize;

use crate::api::Envelope;
use crate::routes::AppState;

#[derive(Serialize)]
struct SystemInfo {
    environment: &'static str,
    version: &'static str,
}

/// GET /v1/healthcheck - liveness and build info
pub async fn healthcheck(State(state): State<AppState>) -> Envelope {
    Envelope::new().with("status", "available").with(
        "system_info",
        &SystemInfo {
            environment: state.config.environment.as_str(),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
