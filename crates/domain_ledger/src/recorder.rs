//! Transaction Recorder
//!
//! Records one B2B transaction atomically: bill number, priced items, balance
//! and due-counter update, inventory movement. Everything is validated before
//! the store is touched; anything failing afterwards drops the unit of work.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use core_kernel::{ActorId, Money, TransactionId};

use crate::balance;
use crate::config::LedgerConfig;
use crate::cylinder::TransactionRef;
use crate::error::LedgerError;
use crate::inventory::InventoryAdjuster;
use crate::ports::LedgerStore;
use crate::pricing::{ensure_currency, price_line};
use crate::transaction::{ItemCategory, ItemKind, LedgerTransaction, RecordTransaction, TransactionItem, TransactionType};

pub struct TransactionRecorder {
    store: Arc<dyn LedgerStore>,
    config: Arc<LedgerConfig>,
}

impl TransactionRecorder {
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, transaction_type = %request.transaction_type, actor = %actor))]
    pub async fn record(
        &self,
        request: RecordTransaction,
        actor: &ActorId,
    ) -> Result<LedgerTransaction, LedgerError> {
        let instant = self
            .config
            .clock
            .resolve(&request.date, request.time.as_deref())?;
        let mut items = self.price_items(&request)?;
        let total = Money::sum(items.iter().map(|i| &i.total_price), self.config.currency)?;
        let unpaid = self.unpaid_amount(&request, total)?;

        let mut uow = self.store.begin().await?;
        let mut customer = uow.lock_customer(request.customer_id).await?;
        let sequence = uow.next_bill_sequence(instant.date).await?;
        let bill_sno = self.config.b2b_bills.compose(instant.date, sequence)?;
        let id = TransactionId::new_v7();
        let now = Utc::now();

        {
            let mut adjuster = InventoryAdjuster::new(uow.as_mut(), bill_sno.clone(), now);
            apply_inventory(&mut adjuster, request.transaction_type, id, &mut items).await?;
        }

        let requested = balance::effect_of(request.transaction_type, total, unpaid, &items);
        let balance_before = customer.ledger_balance;
        let applied = balance::apply(&mut customer, &requested)?;
        customer.updated_at = now;

        let transaction = LedgerTransaction {
            id,
            bill_sno,
            transaction_type: request.transaction_type,
            customer_id: customer.id,
            transaction_at: instant.at,
            bill_date: instant.date,
            total_amount: total,
            unpaid_amount: unpaid,
            payment_reference: request.payment_reference,
            notes: request.notes,
            balance_effect: applied.balance,
            due_effect: applied.dues,
            created_by: actor.clone(),
            created_at: now,
            void: None,
            items,
        };

        uow.insert_transaction(&transaction).await?;
        uow.save_customer_ledger(&customer).await?;
        uow.commit().await?;

        info!(
            bill_sno = %transaction.bill_sno,
            transaction_type = %transaction.transaction_type,
            customer = %customer.name,
            total = %transaction.total_amount,
            balance_before = %balance_before,
            balance_after = %customer.ledger_balance,
            "Transaction recorded"
        );

        Ok(transaction)
    }

    fn price_items(&self, request: &RecordTransaction) -> Result<Vec<TransactionItem>, LedgerError> {
        if request.items.is_empty() {
            return Err(LedgerError::validation("Transaction must have at least one item"));
        }
        request
            .items
            .iter()
            .map(|item| {
                let category = item.kind.category();
                if !request.transaction_type.permits(category) {
                    return Err(LedgerError::validation(format!(
                        "{} items are not allowed on {} transactions",
                        category.as_str(),
                        request.transaction_type
                    )));
                }
                price_line(item, self.config.currency)
            })
            .collect()
    }

    fn unpaid_amount(&self, request: &RecordTransaction, total: Money) -> Result<Option<Money>, LedgerError> {
        let Some(paid) = request.amount_paid else {
            return Ok(None);
        };
        if request.transaction_type != TransactionType::Sale {
            return Err(LedgerError::validation("Amount paid is only accepted on SALE transactions"));
        }
        ensure_currency(&paid, self.config.currency)?;
        if paid.is_negative() || paid.amount() > total.amount() {
            return Err(LedgerError::validation(format!(
                "Amount paid {} must be between 0 and the total {}",
                paid, total
            )));
        }
        Ok(Some(total.checked_sub(&paid)?))
    }
}

async fn apply_inventory(
    adjuster: &mut InventoryAdjuster<'_>,
    transaction_type: TransactionType,
    id: TransactionId,
    items: &mut [TransactionItem],
) -> Result<(), LedgerError> {
    match transaction_type {
        TransactionType::Sale => {
            for item in items.iter_mut() {
                if let ItemKind::Accessory { product_id, name } = &mut item.kind {
                    *product_id = adjuster.deduct_product(*product_id, name, item.quantity).await?;
                }
            }
        }
        TransactionType::Buyback | TransactionType::ReturnEmpty => {
            let category = if transaction_type == TransactionType::Buyback {
                ItemCategory::Buyback
            } else {
                ItemCategory::EmptyReturn
            };
            for item in items.iter().filter(|i| i.kind.category() == category) {
                if let Some(cylinder_type) = item.kind.cylinder_type() {
                    adjuster
                        .receive_returned(TransactionRef::B2b(id), cylinder_type, item.quantity)
                        .await?;
                }
            }
        }
        TransactionType::Payment | TransactionType::Adjustment | TransactionType::CreditNote => {}
    }
    Ok(())
}
