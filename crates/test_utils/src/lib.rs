//! Test Utilities Crate
//!
//! Shared test infrastructure for the LPG ledger workspace.
//!
//! # Modules
//!
//! - `fixtures`: money helpers, line items and a seeded in-memory ledger
//! - `builders`: builders for customers, cylinders, stock and holdings
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: assertion helpers for ledger state
//! - `generators`: proptest strategies for ledger inputs

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;

use once_cell::sync::Lazy;

static TRACING: Lazy<()> = Lazy::new(|| {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TEST_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

/// Installs a test-friendly tracing subscriber once per test binary
///
/// Set `TEST_LOG=debug` to see the ledger's logs for a failing test.
pub fn init_tracing() {
    Lazy::force(&TRACING);
}
