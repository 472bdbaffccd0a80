use async_trait::async_trait;
use std::collections::HashSet;

use crate::database::manager::{Database, DatabaseError};

pub const MOVIE_READ: &str = "movie:read";
pub const MOVIE_WRITE: &str = "movie:write";

/// Permission codes held by one user. Codes are exact, case-sensitive strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(HashSet<String>);

impl Permissions {
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Permissions(iter.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, DatabaseError>;

    /// Grants the named codes; unknown codes are ignored.
    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), DatabaseError>;
}

pub(crate) const GRANT_PERMISSIONS: &str = r#"
    INSERT INTO users_permissions
    SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
    ON CONFLICT DO NOTHING
"#;

pub struct PgPermissionStore {
    db: Database,
}

impl PgPermissionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, DatabaseError> {
        let query = r#"
            SELECT permissions.code
            FROM permissions
            INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
            WHERE users_permissions.user_id = $1
        "#;

        let codes = self
            .db
            .run(
                sqlx::query_scalar::<_, String>(query)
                    .bind(user_id)
                    .fetch_all(self.db.pool()),
            )
            .await?;

        Ok(codes.into_iter().collect())
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), DatabaseError> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        self.db
            .run(
                sqlx::query(GRANT_PERMISSIONS)
                    .bind(user_id)
                    .bind(&codes)
                    .execute(self.db.pool()),
            )
            .await?;
        Ok(())
    }
}
