use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "greenlight")]
#[command(about = "Greenlight movie database JSON API")]
#[command(version)]
pub struct AppConfig {
    #[arg(long, env = "PORT", default_value_t = 4000, help = "API server port")]
    pub port: u16,

    #[arg(
        long = "env",
        env = "APP_ENV",
        value_enum,
        default_value_t = Environment::Development,
        help = "Environment (development|staging|production)"
    )]
    pub environment: Environment,

    #[command(flatten)]
    pub db: DatabaseConfig,

    #[arg(
        long,
        env = "SMTP_SENDER",
        default_value = "Greenlight <no-reply@greenlight.example.com>",
        help = "Sender address for outgoing mail"
    )]
    pub smtp_sender: String,

    #[arg(
        long,
        env = "CORS_TRUSTED_ORIGINS",
        value_delimiter = ' ',
        num_args = 0..,
        help = "Trusted CORS origins (space separated)"
    )]
    pub cors_trusted_origins: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct DatabaseConfig {
    #[arg(long = "db-dsn", env = "DATABASE_URL", help = "PostgreSQL DSN")]
    pub dsn: String,

    #[arg(long = "db-max-open-conns", env = "DB_MAX_OPEN_CONNS", default_value_t = 25)]
    pub max_open_conns: u32,

    #[arg(long = "db-min-idle-conns", env = "DB_MIN_IDLE_CONNS", default_value_t = 0)]
    pub min_idle_conns: u32,

    #[arg(
        long = "db-max-idle-time",
        env = "DB_MAX_IDLE_TIME",
        default_value = "15m",
        value_parser = humantime::parse_duration
    )]
    pub max_idle_time: Duration,

    #[arg(
        long = "db-query-timeout",
        env = "DB_QUERY_TIMEOUT",
        default_value = "3s",
        value_parser = humantime::parse_duration
    )]
    pub query_timeout: Duration,

    #[arg(long = "db-skip-migrations", env = "DB_SKIP_MIGRATIONS")]
    pub skip_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}
