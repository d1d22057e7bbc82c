//! B2C (retail) ledger
//!
//! Retail customers pay on the spot, so there is no running balance. What is
//! tracked instead is the lifetime profit per customer and the cylinders they
//! hold against a security deposit (`CylinderHolding` rows).

pub mod model;
pub mod recorder;
pub mod reverser;

pub use model::{
    AccessoryItem, CylinderHolding, GasItem, NewAccessoryItem, NewGasItem, NewSecurityItem,
    PaymentMethod, RecordRetailTransaction, RetailCustomer, RetailTransaction, SecurityDirection,
    SecurityItem,
};
pub use recorder::RetailRecorder;
pub use reverser::RetailReverser;
