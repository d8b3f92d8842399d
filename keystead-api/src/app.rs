//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use keystead_api::{app::{build_router, AppState}, config::Config};
//! use keystead_shared::{
//!     auth::jwt::TokenIssuer,
//!     crypto::AesGcmCrypto,
//!     email::LogEmailSender,
//!     services::Services,
//!     store::MemoryStore,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let services = Services::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(AesGcmCrypto::from_secret(&config.crypto.data_key)),
//!     Arc::new(LogEmailSender),
//!     TokenIssuer::new(&config.jwt.secret),
//! );
//! let app = build_router(AppState::new(services, config));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use keystead_shared::services::Services;
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        account_role::{require_admin, require_member, require_owner, resolve_account_role_layer},
        session::{session_rotation_layer, NEW_TOKEN_HEADER},
    },
    routes::{self, auth::SIGNUP_TOKEN_HEADER},
};

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(services: Services, config: Config) -> Self {
        Self {
            services,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete router
///
/// ```text
/// /health                                        public
/// /api/v1/auth/login                  POST       public
/// /api/v1/auth/verify                 POST       public
/// /api/v1/auth/signup/email           POST       public
/// /api/v1/auth/signup/verify          POST       public
/// /api/v1/auth/signup/account         POST       signup token
/// /api/v1/profile                     GET, PUT   session
/// /api/v1/accounts/:account_id        GET        session + member
/// /api/v1/accounts/:account_id/full   GET        session + admin
/// /api/v1/accounts/:account_id        PUT        session + owner
/// /api/v1/accounts/:account_id/users  GET, POST  session + owner
/// /api/v1/accounts/:account_id/users/:user_id
///                                     DELETE     session + owner
/// ```
///
/// Session rotation wraps panic recovery, so a handler panic still returns the
/// rotated token.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/verify", post(routes::auth::verify))
        .route("/signup/email", post(routes::auth::signup_email))
        .route("/signup/verify", post(routes::auth::signup_verify))
        .route("/signup/account", post(routes::auth::signup_account));

    let member_routes = Router::new()
        .route("/accounts/:account_id", get(routes::accounts::get_account))
        .route_layer(from_fn(require_member))
        .route_layer(from_fn_with_state(state.clone(), resolve_account_role_layer));

    let admin_routes = Router::new()
        .route(
            "/accounts/:account_id/full",
            get(routes::accounts::get_detailed_account),
        )
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), resolve_account_role_layer));

    let owner_routes = Router::new()
        .route(
            "/accounts/:account_id",
            axum::routing::put(routes::accounts::update_account),
        )
        .route(
            "/accounts/:account_id/users",
            get(routes::accounts::list_users).post(routes::accounts::add_user),
        )
        .route(
            "/accounts/:account_id/users/:user_id",
            delete(routes::accounts::remove_user),
        )
        .route_layer(from_fn(require_owner))
        .route_layer(from_fn_with_state(state.clone(), resolve_account_role_layer));

    let protected_routes = Router::new()
        .route(
            "/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .merge(member_routes)
        .merge(admin_routes)
        .merge(owner_routes)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(state.clone(), session_rotation_layer));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", v1_routes)
        .layer(cors_layer(&state.config))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let token_headers = [
        HeaderName::from_static(NEW_TOKEN_HEADER),
        HeaderName::from_static(SIGNUP_TOKEN_HEADER),
    ];

    if config.api.cors_origins.is_empty() {
        return CorsLayer::permissive().expose_headers(token_headers);
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(SIGNUP_TOKEN_HEADER),
        ])
        .expose_headers(token_headers)
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

pub(crate) fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::InternalError("Request handler panicked".to_string()).into_response()
}
