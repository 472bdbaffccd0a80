#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

static SERVER: OnceLock<Option<TestServer>> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub dsn: String,
    child: Mutex<Child>,
}

impl TestServer {
    fn spawn(dsn: String) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_greenlight"))
            .arg("--port")
            .arg(port.to_string())
            .arg("--db-dsn")
            .arg(&dsn)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            dsn,
            child: Mutex::new(child),
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/v1/healthcheck", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            if let Ok(Some(status)) = self.child.lock().unwrap().try_wait() {
                anyhow::bail!("server exited early with {status}");
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn pool(&self) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(2)
            .connect(&self.dsn)
            .await
            .context("failed to connect to test database")
    }
}

/// Shared server for the test binary, or `None` when DATABASE_URL is unset.
pub async fn ensure_server() -> Result<Option<&'static TestServer>> {
    let server = SERVER.get_or_init(|| {
        let _ = dotenvy::dotenv();
        std::env::var("DATABASE_URL")
            .ok()
            .map(|dsn| TestServer::spawn(dsn).expect("failed to spawn server binary"))
    });

    match server {
        Some(server) => {
            server.wait_ready(Duration::from_secs(15)).await?;
            Ok(Some(server))
        }
        None => {
            eprintln!("DATABASE_URL not set; skipping integration test");
            Ok(None)
        }
    }
}

/// Unique address so reruns against the same database do not collide.
pub fn unique_email(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}-{nanos}@example.com")
}

pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub password: String,
}

/// Registers through the API, then activates and grants `codes` directly in
/// the database, since activation tokens only travel by email.
pub async fn activated_user(server: &TestServer, codes: &[&str]) -> Result<TestUser> {
    let client = reqwest::Client::new();
    let email = unique_email("user");
    let password = "pa55word".to_string();

    let res = client
        .post(server.url("/v1/users"))
        .json(&json!({"name": "Test User", "email": email, "password": password}))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::ACCEPTED, "register: {}", res.status());
    let body: Value = res.json().await?;
    let id = body["user"]["id"].as_i64().context("user id missing")?;

    let pool = server.pool().await?;
    sqlx::query("UPDATE users SET activated = true, version = version + 1 WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;
    let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
    sqlx::query(
        "INSERT INTO users_permissions SELECT $1, id FROM permissions WHERE code = ANY($2) ON CONFLICT DO NOTHING",
    )
    .bind(id)
    .bind(&codes)
    .execute(&pool)
    .await?;
    pool.close().await;

    Ok(TestUser { id, email, password })
}

pub async fn login(server: &TestServer, user: &TestUser) -> Result<String> {
    let res = reqwest::Client::new()
        .post(server.url("/v1/users/authentication"))
        .json(&json!({"email": user.email, "password": user.password}))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "login: {}", res.status());
    let body: Value = res.json().await?;
    body["authentication_token"]["token"]
        .as_str()
        .map(str::to_string)
        .context("token missing")
}
