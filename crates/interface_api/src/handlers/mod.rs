//! Request handlers

pub mod customers;
pub mod health;
pub mod retail;
pub mod transactions;
