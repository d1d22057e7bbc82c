//! Core Kernel - Foundational types and utilities for the LPG ledger
//!
//! This crate provides the fundamental building blocks used across the workspace:
//! - Money types with precise decimal arithmetic
//! - Business-calendar time resolution
//! - Strongly-typed identifiers
//! - Port error and health-check contracts for adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{Timezone, BusinessClock, BusinessInstant, TemporalError};
pub use identifiers::{
    ActorId, CustomerId, RetailCustomerId, TransactionId, TransactionItemId,
    RetailTransactionId, RetailItemId, CylinderId, ProductId, CustomItemId, HoldingId,
};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
