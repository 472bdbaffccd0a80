//! In-memory stores and an in-process app harness for tests.
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use http_body_util::BodyExt;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use crate::auth;
use crate::background::BackgroundTasks;
use crate::config::AppConfig;
use crate::database::models::{
    Movie, MovieStore, PermissionStore, Permissions, Token, TokenScope, TokenStore, User,
    UserStore,
};
use crate::database::{DatabaseError, Models};
use crate::filter::{Filters, Metadata, SortDirection};
use crate::mailer::{Mailer, Template};
use crate::routes::{app, AppState};


pub fn activated_user(id: i64) -> User {
    User {
        id,
        created_at: Utc::now(),
        name: format!("user{id}"),
        email: format!("user{id}@example.com"),
        password_hash: String::new(),
        activated: true,
        version: 1,
    }
}

pub fn inactive_user(id: i64) -> User {
    User {
        activated: false,
        ..activated_user(id)
    }
}

pub fn movie(title: &str, year: i32, genres: &[&str]) -> Movie {
    Movie {
        id: 0,
        created_at: Utc::now(),
        title: title.to_string(),
        year,
        runtime: 100,
        genres: genres.iter().map(|g| g.to_string()).collect(),
        version: 1,
    }
}

struct StoredToken {
    hash: Vec<u8>,
    user_id: i64,
    expiry: DateTime<Utc>,
    scope: TokenScope,
}

/// Backs every store trait with process memory and counts calls, so tests
/// can assert that a rejected request never touched storage.
#[derive(Default)]
pub struct MemoryStore {
    movies: Mutex<BTreeMap<i64, Movie>>,
    users: Mutex<BTreeMap<i64, User>>,
    tokens: Mutex<Vec<StoredToken>>,
    permissions: Mutex<HashMap<i64, HashSet<String>>>,
    next_movie_id: AtomicI64,
    next_user_id: AtomicI64,
    movie_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    permission_lookups: AtomicUsize,
    fail_registrations: AtomicBool,
}

impl MemoryStore {
    pub fn add_user(&self, user: User) {
        self.next_user_id.fetch_max(user.id, Ordering::SeqCst);
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn user(&self, id: i64) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    pub fn add_movie(&self, mut movie: Movie) -> i64 {
        if movie.id == 0 {
            movie.id = self.next_movie_id.fetch_add(1, Ordering::SeqCst) + 1;
        } else {
            self.next_movie_id.fetch_max(movie.id, Ordering::SeqCst);
        }
        let id = movie.id;
        self.movies.lock().unwrap().insert(id, movie);
        id
    }

    pub fn movie(&self, id: i64) -> Option<Movie> {
        self.movies.lock().unwrap().get(&id).cloned()
    }

    /// While set, registrations fail as a mid-transaction database error would.
    pub fn fail_registrations(&self, fail: bool) {
        self.fail_registrations.store(fail, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn grant(&self, user_id: i64, codes: &[&str]) {
        self.permissions
            .lock()
            .unwrap()
            .entry(user_id)
            .or_default()
            .extend(codes.iter().map(|c| c.to_string()));
    }

    pub fn token_count(&self, user_id: i64, scope: TokenScope) -> usize {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && t.scope == scope)
            .count()
    }

    pub fn movie_calls(&self) -> usize {
        self.movie_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn permission_lookups(&self) -> usize {
        self.permission_lookups.load(Ordering::SeqCst)
    }

    fn touch_movies(&self) {
        self.movie_calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn title_matches(title: &str, query: &str) -> bool {
    let words: Vec<String> = title.split_whitespace().map(str::to_lowercase).collect();
    query
        .split_whitespace()
        .all(|q| words.contains(&q.to_lowercase()))
}

fn genres_match(genres: &[String], wanted: &[String]) -> bool {
    let have: HashSet<String> = genres.iter().map(|g| g.to_lowercase()).collect();
    wanted.iter().all(|w| have.contains(&w.to_lowercase()))
}

fn compare(a: &Movie, b: &Movie, column: &str) -> CmpOrdering {
    match column {
        "title" => a.title.cmp(&b.title),
        "year" => a.year.cmp(&b.year),
        "runtime" => a.runtime.cmp(&b.runtime),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn insert(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        self.touch_movies();
        movie.id = 0;
        movie.version = 1;
        movie.created_at = Utc::now();
        movie.id = self.add_movie(movie.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Movie, DatabaseError> {
        self.touch_movies();
        self.movie(id).ok_or(DatabaseError::NotFound)
    }

    async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError> {
        self.touch_movies();
        let order = filters.sort_order()?;

        let mut matching: Vec<Movie> = self
            .movies
            .lock()
            .unwrap()
            .values()
            .filter(|m| title_matches(&m.title, title) && genres_match(&m.genres, genres))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let primary = compare(a, b, order.column());
            let primary = match order.direction() {
                SortDirection::Asc => primary,
                SortDirection::Desc => primary.reverse(),
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = matching.len() as i64;
        let page: Vec<Movie> = matching
            .into_iter()
            .skip(filters.offset() as usize)
            .take(filters.limit() as usize)
            .collect();

        Ok((page, Metadata::calculate(total, filters.page, filters.page_size)))
    }

    async fn update(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        self.touch_movies();
        let mut movies = self.movies.lock().unwrap();
        match movies.get(&movie.id) {
            Some(stored) if stored.version == movie.version => {
                movie.version += 1;
                movies.insert(movie.id, movie.clone());
                Ok(())
            }
            _ => Err(DatabaseError::EditConflict),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        self.touch_movies();
        self.movies
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(DatabaseError::NotFound)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn register(
        &self,
        user: &mut User,
        codes: &[&str],
        activation_ttl: Duration,
    ) -> Result<Token, DatabaseError> {
        {
            let mut users = self.users.lock().unwrap();
            let email = user.email.to_lowercase();
            if users.values().any(|u| u.email.to_lowercase() == email) {
                return Err(DatabaseError::DuplicateEmail);
            }
            if self.fail_registrations.load(Ordering::SeqCst) {
                return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
            }

            user.id = self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1;
            user.version = 1;
            users.insert(user.id, user.clone());
        }

        self.add_for_user(user.id, codes).await?;
        self.new_token(user.id, activation_ttl, TokenScope::Activation)
            .await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, DatabaseError> {
        let email = email.to_lowercase();
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn update(&self, user: &mut User) -> Result<(), DatabaseError> {
        let mut users = self.users.lock().unwrap();
        match users.get(&user.id) {
            Some(stored) if stored.version == user.version => {
                user.version += 1;
                users.insert(user.id, user.clone());
                Ok(())
            }
            _ => Err(DatabaseError::EditConflict),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn new_token(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, DatabaseError> {
        let token = Token::generate(user_id, ttl, scope);
        self.tokens.lock().unwrap().push(StoredToken {
            hash: token.hash.clone(),
            user_id,
            expiry: token.expiry,
            scope,
        });
        Ok(token)
    }

    async fn resolve(&self, scope: TokenScope, plaintext: &str) -> Result<User, DatabaseError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let hash = auth::digest(plaintext);
        let now = Utc::now();

        let user_id = self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.hash == hash && t.scope == scope && t.expiry > now)
            .map(|t| t.user_id)
            .ok_or(DatabaseError::NotFound)?;

        self.user(user_id).ok_or(DatabaseError::NotFound)
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<(), DatabaseError> {
        self.tokens
            .lock()
            .unwrap()
            .retain(|t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, DatabaseError> {
        self.permission_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .permissions
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), DatabaseError> {
        self.grant(user_id, codes);
        Ok(())
    }
}

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, Template)>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, Template)> {
        self.sent.lock().unwrap().clone()
    }

    /// Activation token carried by the most recent message to `recipient`.
    pub fn last_activation_token(&self, recipient: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == recipient)
            .map(|(_, template)| match template {
                Template::UserWelcome {
                    activation_token, ..
                } => activation_token.clone(),
                Template::TokenActivation { activation_token } => activation_token.clone(),
            })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: &str, template: Template) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), template));
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// The full router over in-memory stores, driven with `oneshot`.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub background: BackgroundTasks,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::try_parse_from([
            "greenlight",
            "--db-dsn",
            "postgres://localhost/greenlight_test",
        ])
        .unwrap();
        let store = Arc::new(MemoryStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let background = BackgroundTasks::new();

        let state = AppState {
            config: Arc::new(config),
            models: Models {
                movies: store.clone(),
                users: store.clone(),
                tokens: store.clone(),
                permissions: store.clone(),
            },
            mailer: mailer.clone(),
            background: background.clone(),
        };

        Self {
            store,
            mailer,
            background,
            router: app(state),
        }
    }

    /// Adds a user holding `codes` and returns a live bearer token for it.
    pub async fn user_with(&self, id: i64, activated: bool, codes: &[&str]) -> String {
        let user = if activated {
            activated_user(id)
        } else {
            inactive_user(id)
        };
        self.store.add_user(user);
        self.store.grant(id, codes);
        self.store
            .new_token(id, Duration::hours(1), TokenScope::Authentication)
            .await
            .unwrap()
            .plaintext
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
