//! Repository implementations for the ledger tables
//!
//! Repositories encapsulate SQL and map rows onto plain structs. They are
//! stateless: every function takes the `PgConnection` of the caller's
//! transaction, which is how an entire recording or void stays atomic.

pub mod ledger;
pub mod retail;

pub use ledger::LedgerRepository;
pub use retail::RetailRepository;
