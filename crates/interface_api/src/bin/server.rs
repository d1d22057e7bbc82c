//! LPG Ledger - API Server Binary
//!
//! Starts the HTTP API in front of the PostgreSQL-backed ledger.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin lpg-ledger-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_DATABASE_URL=postgres://... cargo run --bin lpg-ledger-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string (`DATABASE_URL` also accepted)
//! * `API_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `API_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `API_CURRENCY` - Ledger currency code (default: PKR)
//! * `API_TIMEZONE` - Business timezone (default: Asia/Karachi)
//! * `API_B2B_BILL_PREFIX`, `API_B2C_BILL_PREFIX`, `API_BILL_WIDTH` - bill numbering
//! * `API_RECONCILIATION` - `lenient` or `strict` inventory reconciliation on void

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_ledger::LedgerService;
use infra_db::{create_pool, DatabaseConfig, PostgresLedgerStore, MIGRATOR};
use interface_api::{config::ApiConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config()?;
    let ledger_config = config.ledger_config().context("invalid ledger configuration")?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        currency = %ledger_config.currency,
        timezone = %ledger_config.clock.timezone().name(),
        reconciliation = ?ledger_config.reconciliation,
        "Starting LPG ledger API server"
    );

    let pool = create_pool(
        DatabaseConfig::new(&config.database_url)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .application_name("lpg-ledger-api"),
    )
    .await
    .context("failed to connect to the database")?;

    tracing::info!("Running database migrations...");
    MIGRATOR.run(&pool).await.context("failed to apply migrations")?;

    let store = PostgresLedgerStore::new(pool, ledger_config.currency);
    let service = Arc::new(LedgerService::new(Arc::new(store), ledger_config));
    let app = create_router(service, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads the API configuration, accepting the conventional `DATABASE_URL`
fn load_config() -> anyhow::Result<ApiConfig> {
    let mut config = ApiConfig::from_env().context("invalid API_* environment")?;
    if std::env::var("API_DATABASE_URL").is_err() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
    }
    Ok(config)
}

/// Initializes the tracing subscriber; `RUST_LOG` overrides `API_LOG_LEVEL`
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
