//! Ledger projection
//!
//! A customer's balance and due counters are a cache of their transaction
//! history. `project` recomputes them by replaying every non-voided
//! transaction from a zero opening, in chronological order, through the
//! Ledger Balance Calculator. Comparing the result with the cached values is
//! how the ledger is audited.

use chrono::{DateTime, Utc};
use serde::Serialize;

use core_kernel::{Currency, CustomerId, Money, TransactionId};

use crate::balance;
use crate::customer::{Customer, DueCounters};
use crate::error::LedgerError;
use crate::transaction::{LedgerTransaction, TransactionType};

/// One replayed transaction with the running totals after it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub bill_sno: String,
    pub transaction_type: TransactionType,
    pub transaction_at: DateTime<Utc>,
    pub total_amount: Money,
    pub balance_change: Money,
    pub running_balance: Money,
    pub dues_after: DueCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerLedger {
    pub customer_id: CustomerId,
    pub balance: Money,
    pub dues: DueCounters,
    pub entries: Vec<LedgerEntry>,
    pub voided: usize,
}

/// Replays a customer's history
pub fn project(
    customer_id: CustomerId,
    currency: Currency,
    transactions: &[LedgerTransaction],
) -> Result<CustomerLedger, LedgerError> {
    let mut ordered: Vec<&LedgerTransaction> = transactions
        .iter()
        .filter(|t| t.customer_id == customer_id)
        .collect();
    ordered.sort_by(|a, b| {
        a.transaction_at
            .cmp(&b.transaction_at)
            .then_with(|| a.bill_sno.cmp(&b.bill_sno))
    });

    let mut balance = Money::zero(currency);
    let mut dues = DueCounters::default();
    let mut entries = Vec::new();
    let mut voided = 0;

    for transaction in ordered {
        if transaction.is_voided() {
            voided += 1;
            continue;
        }
        let effect = balance::effect_of(
            transaction.transaction_type,
            transaction.total_amount,
            transaction.unpaid_amount,
            &transaction.items,
        );
        balance = balance.checked_add(&effect.balance)?;
        dues.apply(&effect.dues);
        entries.push(LedgerEntry {
            transaction_id: transaction.id,
            bill_sno: transaction.bill_sno.clone(),
            transaction_type: transaction.transaction_type,
            transaction_at: transaction.transaction_at,
            total_amount: transaction.total_amount,
            balance_change: effect.balance,
            running_balance: balance,
            dues_after: dues,
        });
    }

    Ok(CustomerLedger {
        customer_id,
        balance,
        dues,
        entries,
        voided,
    })
}

/// Cached customer totals next to the replayed ones
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub cached_balance: Money,
    pub cached_dues: DueCounters,
    pub projected: CustomerLedger,
    pub is_consistent: bool,
}

impl Reconciliation {
    /// Due counters clamp at zero, so a history whose returns ran ahead of
    /// its deliveries can legitimately replay to different dues when
    /// transactions were voided out of order. Balances always match.
    pub fn compare(customer: &Customer, projected: CustomerLedger) -> Self {
        let is_consistent =
            customer.ledger_balance == projected.balance && customer.dues == projected.dues;
        Self {
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            cached_balance: customer.ledger_balance,
            cached_dues: customer.dues,
            projected,
            is_consistent,
        }
    }
}
