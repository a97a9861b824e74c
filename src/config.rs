//! Configuration management for the image gateway.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `GATEWAY_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use image_gateway::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `GATEWAY_HOST` - Server bind address (default: 0.0.0.0)
//! - `GATEWAY_PORT` - Server port (default: 3000)
//! - `GATEWAY_ACCESS_TOKEN_PUBLIC` - Base64-encoded PEM public key (required)
//! - `GATEWAY_TOKEN_ALGORITHM` - Token signature algorithm (default: RS256)
//! - `GATEWAY_DATABASE_URL` - PostgreSQL URL; in-memory store when unset
//! - `GATEWAY_DATABASE_POOL_SIZE` - Connection pool size (default: 5)
//! - `GATEWAY_IMAGE_SERVICE_URL` - Upstream image host base URL (required)
//! - `GATEWAY_IMAGE_SERVICE_TOKEN` - Upstream service credential (required)
//! - `GATEWAY_UPSTREAM_TIMEOUT_SECS` - Per-attempt upstream deadline (default: 10)
//! - `GATEWAY_UPSTREAM_MAX_RETRIES` - Retries for idempotent calls (default: 2)
//! - `GATEWAY_REQUEST_TIMEOUT_SECS` - Whole-request deadline (default: 45)
//! - `GATEWAY_BODY_LIMIT` - Max JSON body size in bytes (default: 512000)
//! - `GATEWAY_CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::auth::{parse_algorithm, TokenVerifier, DEFAULT_TOKEN_ALGORITHM};
use crate::error::ConfigError;
use crate::server::routes::{DEFAULT_BODY_LIMIT, RouterConfig};
use crate::store::{PostgresConfig, DEFAULT_POOL_SIZE};
use crate::upstream::HttpImageHostConfig;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default per-attempt upstream timeout in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Default number of upstream retries.
pub const DEFAULT_UPSTREAM_MAX_RETRIES: u32 = 2;

/// Default whole-request timeout in seconds.
///
/// Leaves room for one idempotent upstream call that exhausts its retries.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 45;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image gateway - per-user image metadata in front of an upstream image host.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GATEWAY_PORT")]
    pub port: u16,

    /// Deadline for handling a whole request, in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "GATEWAY_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// Maximum accepted JSON body size in bytes.
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT, env = "GATEWAY_BODY_LIMIT")]
    pub body_limit: usize,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Base64-encoded PEM public key used to verify access tokens.
    #[arg(long, env = "GATEWAY_ACCESS_TOKEN_PUBLIC", hide_env_values = true)]
    pub access_token_public: String,

    /// Signature algorithm of access tokens (RS*, PS*, ES*, EdDSA).
    #[arg(long, default_value = DEFAULT_TOKEN_ALGORITHM, env = "GATEWAY_TOKEN_ALGORITHM")]
    pub token_algorithm: String,

    // =========================================================================
    // Metadata Store Configuration
    // =========================================================================
    /// PostgreSQL connection URL.
    ///
    /// If not specified, records are kept in memory and lost on restart.
    #[arg(long, env = "GATEWAY_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum number of pooled database connections.
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "GATEWAY_DATABASE_POOL_SIZE")]
    pub database_pool_size: u32,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Base URL of the upstream image service.
    #[arg(long, env = "GATEWAY_IMAGE_SERVICE_URL")]
    pub image_service_url: String,

    /// Service credential sent to the upstream image service.
    #[arg(long, env = "GATEWAY_IMAGE_SERVICE_TOKEN", hide_env_values = true)]
    pub image_service_token: String,

    /// Deadline for a single upstream attempt, in seconds.
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS, env = "GATEWAY_UPSTREAM_TIMEOUT_SECS")]
    pub upstream_timeout_secs: u64,

    /// Retries after the first attempt for idempotent upstream calls.
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_MAX_RETRIES, env = "GATEWAY_UPSTREAM_MAX_RETRIES")]
    pub upstream_max_retries: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated). If not set, allows any origin.
    #[arg(long, env = "GATEWAY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration.
    ///
    /// Builds every component configuration once so that bad keys, URLs
    /// and limits are reported before the server starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero("request timeout"));
        }
        if self.body_limit == 0 {
            return Err(ConfigError::Zero("body limit"));
        }

        self.token_verifier()?;

        let upstream = self.image_host_config()?.worst_case_duration();
        let request = Duration::from_secs(self.request_timeout_secs);
        if request < upstream {
            return Err(ConfigError::RequestTimeoutTooShort { request, upstream });
        }
        if let Some(postgres) = self.postgres_config() {
            postgres.validate()?;
        }

        Ok(())
    }

    /// Get the bind address as a string.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the access token verifier.
    pub fn token_verifier(&self) -> Result<TokenVerifier, ConfigError> {
        let algorithm = parse_algorithm(&self.token_algorithm)?;
        Ok(TokenVerifier::from_base64_pem(
            &self.access_token_public,
            algorithm,
        )?)
    }

    /// Build the upstream client configuration.
    pub fn image_host_config(&self) -> Result<HttpImageHostConfig, ConfigError> {
        let base_url =
            Url::parse(self.image_service_url.trim()).map_err(|e| ConfigError::InvalidUrl {
                name: "image service URL",
                message: e.to_string(),
            })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                name: "image service URL",
                message: format!("unsupported scheme '{}'", base_url.scheme()),
            });
        }
        if self.image_service_token.trim().is_empty() {
            return Err(ConfigError::Zero("image service token length"));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::Zero("upstream timeout"));
        }

        Ok(
            HttpImageHostConfig::new(base_url, self.image_service_token.trim())
                .with_timeout(Duration::from_secs(self.upstream_timeout_secs))
                .with_max_retries(self.upstream_max_retries),
        )
    }

    /// Database settings, if a database URL is configured.
    pub fn postgres_config(&self) -> Option<PostgresConfig> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| PostgresConfig::new(url).with_pool_size(self.database_pool_size))
    }

    /// Build the router configuration.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new()
            .with_body_limit(self.body_limit)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_tracing(!self.no_tracing);

        if let Some(ref origins) = self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config
    }
}
