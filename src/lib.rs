//! # Image Gateway
//!
//! A REST gateway for per-user image collections.
//!
//! Callers authenticate with a signed bearer token. The gateway keeps the
//! metadata of each image (owner, description, content type, upstream URL)
//! in its own store and forwards the image bytes to an upstream image host,
//! which holds the actual files.
//!
//! ## Features
//!
//! - **Bearer token authentication**: Asymmetric JWT verification (RS256 by default)
//! - **Ownership enforcement**: Only the owner can read, replace, patch or delete an image
//! - **Upstream proxying**: Resilient `reqwest` client with timeouts and retries
//! - **Pluggable storage**: PostgreSQL via `sqlx`, or an in-memory store
//!
//! ## Architecture
//!
//! - [`auth`] - Token verification and caller identity
//! - [`model`] - Image records and content types
//! - [`store`] - Metadata store trait and backends
//! - [`upstream`] - Upstream image host trait and HTTP client
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use image_gateway::{
//!     create_router, AppState, Config, HttpImageHost, MemoryImageStore,
//! };
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::parse();
//!     config.validate()?;
//!
//!     let host = HttpImageHost::new(config.image_host_config()?)?;
//!     let state = AppState::new(
//!         Arc::new(MemoryImageStore::new()),
//!         Arc::new(host),
//!         config.token_verifier()?,
//!     );
//!     let router = create_router(state, config.router_config());
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod server;
pub mod store;
pub mod upstream;

// Re-export commonly used types
pub use auth::{Identity, TokenVerifier};
pub use config::Config;
pub use error::{ApiError, ConfigError, KeyError, StoreError, TokenError, UpstreamError};
pub use model::{ContentType, ImageChanges, ImageRecord, NewImage};
pub use server::{create_router, AppState, RouterConfig};
pub use store::{ImageStore, MemoryImageStore, PostgresConfig, PostgresImageStore};
pub use upstream::{
    HttpImageHost, HttpImageHostConfig, ImageHost, ImagePatch, ImageUpload, UpstreamImage,
};
