//! B2C transaction reverser

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use core_kernel::{ActorId, HoldingId, RetailTransactionId};

use crate::config::{LedgerConfig, ReconciliationPolicy};
use crate::cylinder::{CylinderHolder, TransactionRef};
use crate::error::LedgerError;
use crate::inventory::InventoryAdjuster;
use crate::ports::LedgerStore;
use crate::retail::model::{RetailTransaction, SecurityDirection};
use crate::reverser::{void_reason, ReversalOutcome};
use crate::transaction::VoidRecord;

pub struct RetailReverser {
    store: Arc<dyn LedgerStore>,
    config: Arc<LedgerConfig>,
}

impl RetailReverser {
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    #[instrument(skip(self, reason), fields(transaction_id = %transaction_id, actor = %actor))]
    pub async fn reverse(
        &self,
        transaction_id: RetailTransactionId,
        reason: Option<String>,
        actor: &ActorId,
    ) -> Result<ReversalOutcome<RetailTransaction>, LedgerError> {
        let mut uow = self.store.begin().await?;
        let mut transaction = uow.lock_retail_transaction(transaction_id).await?;
        if transaction.is_voided() {
            return Err(LedgerError::AlreadyVoided(transaction.bill_sno));
        }
        let mut customer = uow.lock_retail_customer(transaction.customer_id).await?;
        let now = Utc::now();

        let profit_before = customer.total_profit;
        customer.total_profit = customer
            .total_profit
            .checked_sub(&transaction.actual_profit)?
            .clamp_non_negative();
        customer.updated_at = now;

        // Deposit holdings were created by this bill and go away with it
        let issued = uow.holdings_issued_by(transaction.id).await?;
        if let Some(returned) = issued.iter().find(|h| h.is_returned) {
            return Err(LedgerError::validation(format!(
                "Cannot void {}: {} {} cylinders from its deposit were already returned",
                transaction.bill_sno, returned.quantity, returned.cylinder_type
            )));
        }
        let issued_ids: Vec<HoldingId> = issued.iter().map(|h| h.id).collect();
        if !issued_ids.is_empty() {
            uow.delete_holdings(&issued_ids).await?;
        }

        let mut return_types: Vec<_> = transaction
            .security_items
            .iter()
            .filter(|i| i.is_return())
            .map(|i| i.cylinder_type)
            .collect();
        return_types.sort();
        return_types.dedup();
        for cylinder_type in return_types {
            let returned = uow
                .holdings_returned_by(customer.id, cylinder_type, transaction.bill_date, transaction.id)
                .await?;
            for mut holding in returned {
                holding.unmark_returned();
                uow.save_holding(&holding).await?;
            }
        }

        let warnings = {
            let mut adjuster = InventoryAdjuster::new(uow.as_mut(), transaction.bill_sno.clone(), now);
            let holder = CylinderHolder::B2c(customer.id);
            for item in &transaction.security_items {
                match item.direction {
                    SecurityDirection::Deposit => {
                        adjuster
                            .restock_from_holder(holder, item.cylinder_type, item.quantity)
                            .await?;
                    }
                    SecurityDirection::Return { .. } => {
                        adjuster
                            .reissue_returned(
                                TransactionRef::B2c(transaction.id),
                                item.cylinder_type,
                                item.quantity,
                                holder,
                                &customer.name,
                            )
                            .await?;
                    }
                }
            }
            for item in &transaction.accessory_items {
                adjuster
                    .restore_stock(item.stock_source, &item.name, item.quantity)
                    .await?;
            }
            adjuster.into_warnings()
        };

        if !warnings.is_empty() && self.config.reconciliation == ReconciliationPolicy::Strict {
            warn!(
                bill_sno = %transaction.bill_sno,
                shortfalls = warnings.len(),
                "Retail reversal rejected, inventory could not be reconciled"
            );
            return Err(LedgerError::InventoryReconciliation(warnings));
        }

        let void = VoidRecord {
            voided_by: actor.clone(),
            voided_at: now,
            reason: void_reason(reason, &self.config),
        };
        uow.mark_retail_transaction_voided(transaction.id, &void).await?;
        uow.save_retail_customer_profit(&customer).await?;
        uow.commit().await?;

        info!(
            bill_sno = %transaction.bill_sno,
            customer = %customer.name,
            profit_before = %profit_before,
            profit_after = %customer.total_profit,
            shortfalls = warnings.len(),
            "Retail transaction voided"
        );

        transaction.void = Some(void);
        Ok(ReversalOutcome { transaction, warnings })
    }
}
