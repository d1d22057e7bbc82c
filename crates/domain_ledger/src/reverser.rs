//! Transaction Reverser
//!
//! Voids a recorded B2B transaction by negating the balance and due-counter
//! effects stored on it and moving the physical inventory back. The
//! transaction row stays in place with its void marker.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use core_kernel::{ActorId, TransactionId};

use crate::balance;
use crate::config::{LedgerConfig, ReconciliationPolicy};
use crate::cylinder::{CylinderHolder, TransactionRef};
use crate::error::LedgerError;
use crate::inventory::{InventoryAdjuster, ReconciliationWarning};
use crate::ports::LedgerStore;
use crate::product::StockSource;
use crate::transaction::{ItemCategory, ItemKind, LedgerTransaction, TransactionType, VoidRecord};

/// A committed reversal and any inventory it could not restore
#[derive(Debug, Clone, Serialize)]
pub struct ReversalOutcome<T> {
    pub transaction: T,
    pub warnings: Vec<ReconciliationWarning>,
}

pub struct TransactionReverser {
    store: Arc<dyn LedgerStore>,
    config: Arc<LedgerConfig>,
}

impl TransactionReverser {
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    #[instrument(skip(self, reason), fields(transaction_id = %transaction_id, actor = %actor))]
    pub async fn reverse(
        &self,
        transaction_id: TransactionId,
        reason: Option<String>,
        actor: &ActorId,
    ) -> Result<ReversalOutcome<LedgerTransaction>, LedgerError> {
        let mut uow = self.store.begin().await?;
        let mut transaction = uow.lock_transaction(transaction_id).await?;
        if transaction.is_voided() {
            return Err(LedgerError::AlreadyVoided(transaction.bill_sno));
        }
        let mut customer = uow.lock_customer(transaction.customer_id).await?;
        let now = Utc::now();

        let balance_before = customer.ledger_balance;
        let inverse = balance::reversal_of(transaction.balance_effect, transaction.due_effect);
        balance::apply(&mut customer, &inverse)?;
        customer.updated_at = now;

        let warnings = {
            let mut adjuster = InventoryAdjuster::new(uow.as_mut(), transaction.bill_sno.clone(), now);
            let holder = CylinderHolder::B2b(customer.id);
            match transaction.transaction_type {
                TransactionType::Sale => {
                    for (cylinder_type, quantity) in transaction.cylinder_quantities(ItemCategory::Cylinder) {
                        adjuster.recall_from_holder(holder, cylinder_type, quantity).await?;
                    }
                    for item in &transaction.items {
                        if let ItemKind::Accessory { product_id: Some(product_id), name } = &item.kind {
                            adjuster
                                .restore_stock(StockSource::Product(*product_id), name, item.quantity)
                                .await?;
                        }
                    }
                }
                TransactionType::Buyback | TransactionType::ReturnEmpty => {
                    let category = if transaction.transaction_type == TransactionType::Buyback {
                        ItemCategory::Buyback
                    } else {
                        ItemCategory::EmptyReturn
                    };
                    for (cylinder_type, quantity) in transaction.cylinder_quantities(category) {
                        adjuster
                            .reissue_returned(
                                TransactionRef::B2b(transaction.id),
                                cylinder_type,
                                quantity,
                                holder,
                                &customer.name,
                            )
                            .await?;
                    }
                }
                TransactionType::Payment | TransactionType::Adjustment | TransactionType::CreditNote => {}
            }
            adjuster.into_warnings()
        };

        if !warnings.is_empty() && self.config.reconciliation == ReconciliationPolicy::Strict {
            warn!(
                bill_sno = %transaction.bill_sno,
                shortfalls = warnings.len(),
                "Reversal rejected, inventory could not be reconciled"
            );
            return Err(LedgerError::InventoryReconciliation(warnings));
        }

        let void = VoidRecord {
            voided_by: actor.clone(),
            voided_at: now,
            reason: void_reason(reason, &self.config),
        };
        uow.mark_transaction_voided(transaction.id, &void).await?;
        uow.save_customer_ledger(&customer).await?;
        uow.commit().await?;

        info!(
            bill_sno = %transaction.bill_sno,
            transaction_type = %transaction.transaction_type,
            customer = %customer.name,
            balance_before = %balance_before,
            balance_after = %customer.ledger_balance,
            shortfalls = warnings.len(),
            "Transaction voided"
        );

        transaction.void = Some(void);
        Ok(ReversalOutcome { transaction, warnings })
    }
}

pub(crate) fn void_reason(reason: Option<String>, config: &LedgerConfig) -> String {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| config.default_void_reason.clone())
}
