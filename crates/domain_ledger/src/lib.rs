//! Ledger Domain
//!
//! Records and voids the transactions of an LPG cylinder distributor:
//!
//! - B2B transactions (sales on account, payments, buybacks, empty returns,
//!   adjustments, credit notes) move a customer's running balance and the
//!   per-type count of cylinders they owe back
//! - B2C transactions (walk-in sales with security deposits) move the
//!   customer's lifetime profit and their deposit holdings
//!
//! Both kinds adjust the physical inventory of cylinders and accessories.
//! Every operation runs in one unit of work of a `LedgerStore`, and every
//! recorded effect can be voided exactly.

pub mod balance;
pub mod bill;
pub mod config;
pub mod customer;
pub mod cylinder;
pub mod error;
pub mod inventory;
pub mod ports;
pub mod pricing;
pub mod product;
pub mod projection;
pub mod recorder;
pub mod retail;
pub mod reverser;
pub mod service;
pub mod transaction;

pub use balance::LedgerEffect;
pub use bill::BillNumberFormat;
pub use config::{LedgerConfig, ReconciliationPolicy};
pub use customer::{Customer, DueCounters, DueDelta};
pub use cylinder::{
    Cylinder, CylinderHolder, CylinderLocation, CylinderMove, CylinderQuery, CylinderStatus,
    CylinderType, NewCylinder, TransactionRef,
};
pub use error::LedgerError;
pub use inventory::{InventoryAdjuster, ReconciliationWarning};
pub use ports::{LedgerStore, LedgerUnitOfWork};
pub use product::{CustomItem, Product, StockSource};
pub use projection::{CustomerLedger, LedgerEntry, Reconciliation};
pub use recorder::TransactionRecorder;
pub use reverser::{ReversalOutcome, TransactionReverser};
pub use service::LedgerService;
pub use transaction::{
    BuybackDetails, ItemCategory, ItemKind, LedgerTransaction, NewItemKind, NewLineItem,
    RecordTransaction, TransactionItem, TransactionType, VoidRecord,
};
