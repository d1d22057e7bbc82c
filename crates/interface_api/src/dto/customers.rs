//! Customer ledger DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use domain_ledger::{DueCounters, LedgerEntry, Reconciliation, TransactionType};

#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub transaction_id: Uuid,
    pub bill_sno: String,
    pub transaction_type: TransactionType,
    pub transaction_at: DateTime<Utc>,
    pub total_amount: Decimal,
    pub balance_change: Decimal,
    pub running_balance: Decimal,
    pub dues_after: DueCounters,
}

impl From<&LedgerEntry> for LedgerEntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            transaction_id: *entry.transaction_id.as_uuid(),
            bill_sno: entry.bill_sno.clone(),
            transaction_type: entry.transaction_type,
            transaction_at: entry.transaction_at,
            total_amount: entry.total_amount.amount(),
            balance_change: entry.balance_change.amount(),
            running_balance: entry.running_balance.amount(),
            dues_after: entry.dues_after,
        }
    }
}

/// Cached balance and dues next to the values replayed from history
#[derive(Debug, Serialize)]
pub struct CustomerLedgerResponse {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub balance: Decimal,
    pub dues: DueCounters,
    pub projected_balance: Decimal,
    pub projected_dues: DueCounters,
    pub is_consistent: bool,
    pub voided_transactions: usize,
    pub entries: Vec<LedgerEntryResponse>,
}

impl From<Reconciliation> for CustomerLedgerResponse {
    fn from(r: Reconciliation) -> Self {
        Self {
            customer_id: *r.customer_id.as_uuid(),
            customer_name: r.customer_name,
            balance: r.cached_balance.amount(),
            dues: r.cached_dues,
            projected_balance: r.projected.balance.amount(),
            projected_dues: r.projected.dues,
            is_consistent: r.is_consistent,
            voided_transactions: r.projected.voided,
            entries: r.projected.entries.iter().map(LedgerEntryResponse::from).collect(),
        }
    }
}
