//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the LPG ledger using SQLx:
//!
//! - `pool`: connection pool configuration
//! - `repositories`: stateless SQL over one connection
//! - `adapters`: `PostgresLedgerStore`, the `LedgerStore` port implementation
//! - `MIGRATOR`: the embedded schema migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, MIGRATOR, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/lpg_ledger")).await?;
//! MIGRATOR.run(&pool).await?;
//! let store = PostgresLedgerStore::new(pool, Currency::PKR);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresLedgerStore;
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, DatabaseConfig, DatabasePool};

/// Schema migrations embedded from `migrations/`
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Applies every pending migration
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}
