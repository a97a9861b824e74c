//! Image gateway - a REST gateway in front of an upstream image host.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_gateway::{
    config::Config,
    server::{create_router, AppState},
    store::{ImageStore, MemoryImageStore, PostgresImageStore},
    upstream::HttpImageHost,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    run(config).await
}

async fn run(config: Config) -> ExitCode {
    let verifier = match config.token_verifier() {
        Ok(verifier) => verifier,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let host = match config.image_host_config().map(HttpImageHost::new) {
        Ok(Ok(host)) => host,
        Ok(Err(e)) => {
            error!("Failed to build upstream client: {}", e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Image service: {}", host.config().base_url);
    info!(
        "  Upstream: {}s timeout, {} retries",
        host.config().timeout.as_secs(),
        host.config().max_retries
    );
    info!("  Token algorithm: {}", config.token_algorithm);
    info!("  Body limit: {} bytes", config.body_limit);

    let store: Arc<dyn ImageStore> = match config.postgres_config() {
        Some(postgres) => {
            info!("  Store: PostgreSQL (table '{}')", postgres.table);
            match PostgresImageStore::connect(&postgres).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!("Failed to connect to database: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => {
            warn!("  Store: IN-MEMORY - records are lost on restart");
            warn!("         Configure a database for production: --database-url=<url>");
            Arc::new(MemoryImageStore::new())
        }
    };

    let state = AppState::new(store, Arc::new(host), verifier);
    let router = create_router(state, config.router_config());

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_gateway=debug,tower_http=debug"
    } else {
        "image_gateway=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
