use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state, map_response},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::background::BackgroundTasks;
use crate::config::AppConfig;
use crate::database::models::{MOVIE_READ, MOVIE_WRITE};
use crate::database::Models;
use crate::error::ApiError;
use crate::handlers::{self, healthcheck::healthcheck, movies, tokens, users};
use crate::mailer::Mailer;
use crate::middleware::{authenticate, require_authenticated, require_permission, PermissionGate};

/// Everything a handler may reach, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub models: Models,
    pub mailer: Arc<dyn Mailer>,
    pub background: BackgroundTasks,
}

pub fn app(state: AppState) -> Router {
    let tokens = state.models.tokens.clone();
    let cors = cors_layer(&state.config.cors_trusted_origins);

    Router::new()
        .route("/v1/healthcheck", get(healthcheck))
        .merge(movie_routes(&state))
        .merge(user_routes())
        .fallback(handlers::not_found)
        .layer(map_response(method_not_allowed))
        .layer(from_fn_with_state(tokens, authenticate))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(recover_panic))
        .with_state(state)
}

// Gates sit on each method router rather than the path, so an unsupported
// method still gets its 405 instead of a permission error.
fn movie_routes(state: &AppState) -> Router<AppState> {
    let read = from_fn_with_state(
        PermissionGate::new(state.models.permissions.clone(), MOVIE_READ),
        require_permission,
    );
    let write = from_fn_with_state(
        PermissionGate::new(state.models.permissions.clone(), MOVIE_WRITE),
        require_permission,
    );

    Router::new()
        .route(
            "/v1/movies",
            get(movies::list_movies)
                .route_layer(read.clone())
                .merge(post(movies::create_movie).route_layer(write.clone())),
        )
        .route(
            "/v1/movies/:id",
            get(movies::show_movie).route_layer(read).merge(
                patch(movies::update_movie)
                    .delete(movies::delete_movie)
                    .route_layer(write),
            ),
        )
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(users::register_user))
        .route("/v1/users/activated", put(users::activate_user))
        .route("/v1/users/activation", post(users::resend_activation))
        .route(
            "/v1/users/authentication",
            post(tokens::create_authentication_token).merge(
                delete(tokens::delete_authentication_tokens)
                    .route_layer(from_fn(require_authenticated)),
            ),
        )
}

/// Gives the router's bare 405 a JSON body, keeping its `Allow` header.
async fn method_not_allowed(method: Method, response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut json = ApiError::MethodNotAllowed(method).into_response();
    if let Some(allow) = allow {
        json.headers_mut().insert(header::ALLOW, allow);
    }
    json
}

fn cors_layer(trusted_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn recover_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let mut response = ApiError::server_error(format!("handler panicked: {detail}")).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
