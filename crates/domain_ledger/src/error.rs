//! Ledger domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError, TemporalError};
use crate::inventory::ReconciliationWarning;

/// Errors that can occur while recording or voiding transactions
///
/// Every variant aborts the surrounding unit of work, so a caller that sees
/// an error knows nothing was written.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input: dates, quantities, item kinds, amounts
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown customer, transaction, product or holding
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// The transaction has already been voided
    #[error("Transaction already voided: {0}")]
    AlreadyVoided(String),

    /// Physical inventory could not be fully reconciled under the strict policy
    #[error("Inventory reconciliation failed: {}", summarize(.0))]
    InventoryReconciliation(Vec<ReconciliationWarning>),

    /// Money arithmetic error
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Store failure
    #[error("Store error: {0}")]
    Store(PortError),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns true if the error is a caller mistake rather than a system failure
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LedgerError::Store(_) | LedgerError::Money(_))
    }
}

impl From<PortError> for LedgerError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => LedgerError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, .. } => LedgerError::Validation(message),
            other => LedgerError::Store(other),
        }
    }
}

impl From<TemporalError> for LedgerError {
    fn from(error: TemporalError) -> Self {
        LedgerError::Validation(error.to_string())
    }
}

fn summarize(warnings: &[ReconciliationWarning]) -> String {
    warnings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
