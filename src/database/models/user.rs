use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::database::manager::{Database, DatabaseError};
use crate::database::models::permission::GRANT_PERMISSIONS;
use crate::database::models::token::{Token, TokenScope, INSERT_TOKEN};
use crate::validator::{matches, Validator, EMAIL_RX};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    #[serde(skip_serializing)]
    pub version: i32,
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

/// Checks a registration: name, email, and the plaintext password before hashing.
pub fn validate_user(v: &mut Validator, name: &str, email: &str, password: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(name.len() <= 500, "name", "must not be more than 500 bytes long");

    validate_email(v, email);
    validate_password_plaintext(v, password);
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists a new user holding `codes` together with one activation
    /// token, atomically: on any failure nothing is stored. `DuplicateEmail`
    /// if the address is taken.
    async fn register(
        &self,
        user: &mut User,
        codes: &[&str],
        activation_ttl: Duration,
    ) -> Result<Token, DatabaseError>;

    async fn get_by_email(&self, email: &str) -> Result<User, DatabaseError>;

    /// Version-conditioned write; `EditConflict` when the row moved on.
    async fn update(&self, user: &mut User) -> Result<(), DatabaseError>;
}

pub struct PgUserStore {
    db: Database,
}

impl PgUserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn is_duplicate_email(err: &DatabaseError) -> bool {
    match err {
        DatabaseError::Sqlx(sqlx::Error::Database(db_err)) => {
            db_err.constraint() == Some("users_email_key")
        }
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn register(
        &self,
        user: &mut User,
        codes: &[&str],
        activation_ttl: Duration,
    ) -> Result<Token, DatabaseError> {
        let query = r#"
            INSERT INTO users (name, email, password_hash, activated)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, version
        "#;

        let mut tx = self.db.run(self.db.pool().begin()).await?;

        let (id, created_at, version) = self
            .db
            .run(
                sqlx::query_as::<_, (i64, DateTime<Utc>, i32)>(query)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.activated)
                    .fetch_one(&mut *tx),
            )
            .await
            .map_err(|e| {
                if is_duplicate_email(&e) {
                    DatabaseError::DuplicateEmail
                } else {
                    e
                }
            })?;

        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        self.db
            .run(
                sqlx::query(GRANT_PERMISSIONS)
                    .bind(id)
                    .bind(&codes)
                    .execute(&mut *tx),
            )
            .await?;

        let token = Token::generate(id, activation_ttl, TokenScope::Activation);
        self.db
            .run(
                sqlx::query(INSERT_TOKEN)
                    .bind(&token.hash)
                    .bind(token.user_id)
                    .bind(token.expiry)
                    .bind(token.scope.as_str())
                    .execute(&mut *tx),
            )
            .await?;

        // Dropping `tx` on any early return rolls the whole registration back.
        self.db.run(tx.commit()).await?;

        user.id = id;
        user.created_at = created_at;
        user.version = version;
        Ok(token)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, DatabaseError> {
        let query = r#"
            SELECT id, created_at, name, email::text AS email, password_hash, activated, version
            FROM users
            WHERE email = $1::citext
        "#;

        self.db
            .run(sqlx::query_as::<_, User>(query).bind(email).fetch_one(self.db.pool()))
            .await
    }

    async fn update(&self, user: &mut User) -> Result<(), DatabaseError> {
        let query = r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
        "#;

        let version = self
            .db
            .run(
                sqlx::query_scalar::<_, i32>(query)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.activated)
                    .bind(user.id)
                    .bind(user.version)
                    .fetch_one(self.db.pool()),
            )
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound => DatabaseError::EditConflict,
                e if is_duplicate_email(&e) => DatabaseError::DuplicateEmail,
                other => other,
            })?;

        user.version = version;
        Ok(())
    }
}
