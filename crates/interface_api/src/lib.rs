//! HTTP API Layer
//!
//! This crate exposes the LPG ledger over REST using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: B2B transactions, walk-in (B2C) transactions, customer ledgers
//! - **Middleware**: bearer authentication, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: ledger errors mapped onto HTTP statuses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(service, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_ledger::LedgerService;

use crate::config::ApiConfig;
use crate::handlers::{customers, health, retail, transactions};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LedgerService>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `service` - The ledger engine, already bound to its store
/// * `config` - API configuration
pub fn create_router(service: Arc<LedgerService>, config: ApiConfig) -> Router {
    let state = AppState { service, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let transaction_routes = Router::new()
        .route("/", post(transactions::create_transaction))
        .route("/:id/void", post(transactions::void_transaction));

    let retail_routes = Router::new()
        .route("/transactions", post(retail::create_retail_transaction))
        .route("/transactions/:id/void", post(retail::void_retail_transaction));

    let customer_routes = Router::new().route("/:id/ledger", get(customers::get_ledger));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/transactions", transaction_routes)
        .nest("/retail", retail_routes)
        .nest("/customers", customer_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
