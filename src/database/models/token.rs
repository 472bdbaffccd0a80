use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::auth::{self, TOKEN_PLAINTEXT_LEN};
use crate::database::manager::{Database, DatabaseError};
use crate::database::models::user::User;
use crate::validator::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
        }
    }
}

/// A freshly issued token. The plaintext exists only here; storage keeps the digest.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Self {
        let plaintext = auth::generate_plaintext();
        Self {
            hash: auth::digest(&plaintext),
            plaintext,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        format!("must be {} bytes long", TOKEN_PLAINTEXT_LEN),
    );
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Issues and persists a token; the returned plaintext is never retrievable again.
    async fn new_token(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, DatabaseError>;

    /// User holding an unexpired token of `scope` with this plaintext.
    /// Unknown, expired, and wrong-scope tokens all return `NotFound`.
    async fn resolve(&self, scope: TokenScope, plaintext: &str) -> Result<User, DatabaseError>;

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<(), DatabaseError>;
}

pub(crate) const INSERT_TOKEN: &str = r#"
    INSERT INTO tokens (hash, user_id, expiry, scope)
    VALUES ($1, $2, $3, $4)
"#;

pub struct PgTokenStore {
    db: Database,
}

impl PgTokenStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn new_token(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, DatabaseError> {
        let token = Token::generate(user_id, ttl, scope);

        self.db
            .run(
                sqlx::query(INSERT_TOKEN)
                    .bind(&token.hash)
                    .bind(token.user_id)
                    .bind(token.expiry)
                    .bind(token.scope.as_str())
                    .execute(self.db.pool()),
            )
            .await?;

        Ok(token)
    }

    async fn resolve(&self, scope: TokenScope, plaintext: &str) -> Result<User, DatabaseError> {
        let hash = auth::digest(plaintext);

        let query = r#"
            SELECT users.id, users.created_at, users.name, users.email::text AS email,
                   users.password_hash, users.activated, users.version
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
            AND tokens.scope = $2
            AND tokens.expiry > $3
        "#;

        self.db
            .run(
                sqlx::query_as::<_, User>(query)
                    .bind(&hash)
                    .bind(scope.as_str())
                    .bind(Utc::now())
                    .fetch_one(self.db.pool()),
            )
            .await
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<(), DatabaseError> {
        self.db
            .run(
                sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                    .bind(scope.as_str())
                    .bind(user_id)
                    .execute(self.db.pool()),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_hash_matches_plaintext() {
        let token = Token::generate(7, Duration::hours(24), TokenScope::Authentication);
        assert_eq!(token.hash, auth::digest(&token.plaintext));
        assert_eq!(token.user_id, 7);
        assert!(token.expiry > Utc::now() + Duration::hours(23));
    }

    #[test]
    fn serializes_only_plaintext_and_expiry() {
        let token = Token::generate(1, Duration::days(3), TokenScope::Activation);
        let json = serde_json::to_value(&token).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(json["token"], token.plaintext);
        assert!(object.contains_key("expiry"));
    }

    #[test]
    fn plaintext_validation() {
        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "");
        assert_eq!(v.errors()["token"], "must be provided");

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "too-short");
        assert_eq!(v.errors()["token"], "must be 22 bytes long");

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, &auth::generate_plaintext());
        assert!(v.valid());
    }
}
