use std::sync::Arc;

pub mod manager;
pub mod models;
pub mod query_builder;

pub use manager::{redact_dsn, Database, DatabaseError};

use models::{
    MovieStore, PermissionStore, PgMovieStore, PgPermissionStore, PgTokenStore, PgUserStore,
    TokenStore, UserStore,
};

/// Data access handles shared by every request.
#[derive(Clone)]
pub struct Models {
    pub movies: Arc<dyn MovieStore>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
}

impl Models {
    pub fn postgres(db: Database) -> Self {
        Self {
            movies: Arc::new(PgMovieStore::new(db.clone())),
            users: Arc::new(PgUserStore::new(db.clone())),
            tokens: Arc::new(PgTokenStore::new(db.clone())),
            permissions: Arc::new(PgPermissionStore::new(db)),
        }
    }
}
