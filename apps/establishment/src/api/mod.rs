//! # Establishment HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Store counts and dropped-row total
//! - `GET /person/{id}` - Fetch one person
//! - `POST /person` - Create a person (session required)
//! - `GET /persons` - List all persons
//! - `POST /relationship` - Create or merge a relationship (session required)
//! - `GET /graph` - The full relationship graph
//! - `POST /register`, `POST /login`, `POST /logout`, `GET /check-session`
//!
//! Any other path is served from the configured static directory.

mod auth;
mod error;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::{SESSION_COOKIE, require_session};
pub use error::ApiError;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
#[allow(unused_imports)]
pub use handlers::{
    add_person_handler, add_relationship_handler, check_session_handler, get_person_handler,
    graph_handler, health_handler, list_persons_handler, login_handler, logout_handler,
    register_handler, status_handler,
};
#[allow(unused_imports)]
pub use types::{
    ErrorResponse, HealthResponse, LoginRequest, LoginResponse, MessageResponse, PersonRequest,
    RegisterRequest, RelationshipRequest, RelationshipResponse, SessionResponse, StatusResponse,
};

use crate::config::Config;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use establishment_core::{Authenticator, EstablishmentError, GraphEngine, RedbStore};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Maximum accepted request body (1 MiB).
const MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. Cloned per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub graph: GraphEngine<RedbStore>,
    pub auth: Authenticator<RedbStore>,
    pub store: Arc<RedbStore>,
    pub config: Arc<Config>,
    /// Rows dropped by graph assembly since startup.
    pub dropped_rows: Arc<AtomicU64>,
}

impl AppState {
    /// Create app state over an opened store.
    #[must_use]
    pub fn new(store: Arc<RedbStore>, config: Config) -> Self {
        Self {
            graph: GraphEngine::new(Arc::clone(&store)),
            auth: Authenticator::new(Arc::clone(&store)).with_session_ttl(config.session_ttl_secs),
            store,
            config: Arc::new(config),
            dropped_rows: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run a synchronous core operation on the blocking pool under the
    /// request deadline.
    ///
    /// An elapsed deadline yields `Timeout`. The blocking task itself runs
    /// to completion; its result is discarded.
    pub async fn run<T, F>(&self, op: F) -> Result<T, EstablishmentError>
    where
        T: Send + 'static,
        F: FnOnce(&AppState) -> Result<T, EstablishmentError> + Send + 'static,
    {
        let state = self.clone();
        let task = tokio::task::spawn_blocking(move || op(&state));
        match tokio::time::timeout(self.config.request_timeout(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(EstablishmentError::store("blocking task", join)),
            Err(_) => Err(EstablishmentError::Timeout),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from the configured origins.
///
/// Credentials are allowed so the session cookie crosses origins. `"*"`
/// mirrors the request origin, since a literal wildcard cannot carry
/// credentials.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins with credentials. This is insecure for production!");
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(hv)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate limiting (if enabled)
/// 5. Session gate - protected routes only
pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let protected = Router::new()
        .route("/person", post(handlers::add_person_handler))
        .route("/relationship", post(handlers::add_relationship_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/person/{id}", get(handlers::get_person_handler))
        .route("/persons", get(handlers::list_persons_handler))
        .route("/graph", get(handlers::graph_handler))
        .route("/register", post(handlers::register_handler))
        .route("/login", post(handlers::login_handler))
        .route("/logout", post(handlers::logout_handler))
        .route("/check-session", get(handlers::check_session_handler))
        .merge(protected)
        .fallback_service(ServeDir::new(&config.static_dir));

    match middleware::create_rate_limiter(config.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Open the store and serve until Ctrl+C.
pub async fn run_server(config: Config) -> Result<(), EstablishmentError> {
    let store = Arc::new(RedbStore::open(&config.database)?);
    let addr = config.bind_addr();
    let router = create_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| EstablishmentError::store("bind listener", e))?;

    tracing::info!("Establishment HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EstablishmentError::store("serve", e))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

// =============================================================================
// TESTS
// =============================================================================
