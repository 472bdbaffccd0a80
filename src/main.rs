use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use greenlight::background::BackgroundTasks;
use greenlight::config::AppConfig;
use greenlight::database::{redact_dsn, Database, Models};
use greenlight::mailer::LogMailer;
use greenlight::routes::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and friends.
    let _ = dotenvy::dotenv();

    let config = Arc::new(AppConfig::parse());
    init_tracing(&config);

    tracing::info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        dsn = %redact_dsn(&config.db.dsn).unwrap_or_else(|_| "<invalid>".to_string()),
        "starting greenlight"
    );

    let db = Database::connect(&config.db)
        .await
        .context("failed to open database connection pool")?;

    if !config.db.skip_migrations {
        db.migrate().await.context("failed to apply migrations")?;
    }

    let background = BackgroundTasks::new();
    let state = AppState {
        config: config.clone(),
        models: Models::postgres(db.clone()),
        mailer: Arc::new(LogMailer::new(config.smtp_sender.clone())),
        background: background.clone(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "starting server");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!(in_flight = background.in_flight(), "completing background tasks");
    background.wait().await;
    db.close().await;

    tracing::info!(%addr, "stopped server");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("greenlight=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.is_development() {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down server");
}
