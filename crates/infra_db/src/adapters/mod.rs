//! Domain Adapters
//!
//! Implementations of the ledger domain's ports on the PostgreSQL layer.
//! Adapters translate between domain models and repository row types and
//! map `DatabaseError`s onto `PortError`s.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//!
//! let store = PostgresLedgerStore::new(pool, Currency::PKR);
//! let mut uow = store.begin().await?;
//! ```

mod convert;
pub mod ledger;

pub use ledger::PostgresLedgerStore;
