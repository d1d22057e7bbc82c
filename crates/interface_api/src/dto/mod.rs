//! Request/response bodies

pub mod customers;
pub mod retail;
pub mod transactions;
