//! Router configuration for the image gateway.
//!
//! This module defines the HTTP routes and applies middleware for
//! authentication, ownership, CORS, body limits, timeouts and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                   - Health check (public)
//! /api/v1                   - API index (public)
//! /api/v1/images            - List / create (bearer token)
//! /api/v1/images/{id}       - Get / replace / patch / delete (bearer token + ownership)
//! ```
//!
//! # Layering
//!
//! ```text
//! request ─► trace ─► security headers ─► cors ─► deadline ─► body limit
//!         ─► require_identity ─► [require_ownership] ─► handler
//! ```
//!
//! # Example
//!
//! ```ignore
//! use image_gateway::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(store, host, verifier);
//! let router = create_router(state, RouterConfig::new().with_body_limit(512_000));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::require_identity;
use super::deadline::enforce_deadline;
use super::gate::require_ownership;
use super::handlers::{
    create_image, delete_image, get_image, health_handler, index_handler, list_images,
    not_found_handler, patch_image, replace_image, AppState, API_PREFIX,
};
use super::headers::with_security_headers;

/// Default JSON body limit (500 KB).
pub const DEFAULT_BODY_LIMIT: usize = 512_000;

/// Default whole-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Maximum accepted request body size in bytes
    pub body_limit: usize,

    /// Deadline for handling a whole request
    pub request_timeout: Duration,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration with defaults.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Bodies are limited to 500 KB
    /// - Requests time out after 45 seconds
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            body_limit: DEFAULT_BODY_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `state` - Store, upstream host and token verifier
/// * `config` - Router configuration
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let api = build_api_router(state);

    let router = Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health_handler))
        .method_not_allowed_fallback(not_found_handler)
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(middleware::from_fn_with_state(
            config.request_timeout,
            enforce_deadline,
        ))
        .layer(build_cors_layer(&config));

    let router = with_security_headers(router);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the `/api/v1` subtree.
///
/// `route_layer` only wraps routes registered before it, so the index route
/// added last stays public. An unsupported method on a known path answers
/// like an unknown path.
fn build_api_router(state: AppState) -> Router {
    let single_image = Router::new()
        .route(
            "/images/{id}",
            get(get_image)
                .put(replace_image)
                .patch(patch_image)
                .delete(delete_image),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_ownership,
        ));

    let collection = Router::new().route("/images", get(list_images).post(create_image));

    Router::new()
        .merge(single_image)
        .merge(collection)
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            require_identity,
        ))
        .route("/", get(index_handler))
        .method_not_allowed_fallback(not_found_handler)
        .with_state(state)
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
