//! B2C transaction recorder

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use core_kernel::{ActorId, Currency, HoldingId, Money, RetailCustomerId, RetailItemId, RetailTransactionId};

use crate::config::LedgerConfig;
use crate::cylinder::{CylinderHolder, TransactionRef};
use crate::error::LedgerError;
use crate::inventory::InventoryAdjuster;
use crate::ports::{LedgerStore, LedgerUnitOfWork};
use crate::pricing::{checked_quantity, ensure_currency};
use crate::product::StockSource;
use crate::retail::model::{
    AccessoryItem, CylinderHolding, GasItem, RecordRetailTransaction, RetailTransaction,
    SecurityDirection, SecurityItem,
};

pub struct RetailRecorder {
    store: Arc<dyn LedgerStore>,
    config: Arc<LedgerConfig>,
}

/// Priced lines and totals of a retail transaction
struct PricedRetail {
    gas_items: Vec<GasItem>,
    security_items: Vec<SecurityItem>,
    accessory_items: Vec<AccessoryItem>,
    total: Money,
    delivery: Money,
    profit: Money,
}

impl RetailRecorder {
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, actor = %actor))]
    pub async fn record(
        &self,
        request: RecordRetailTransaction,
        actor: &ActorId,
    ) -> Result<RetailTransaction, LedgerError> {
        let instant = self
            .config
            .clock
            .resolve(&request.date, request.time.as_deref())?;
        let transaction_type = request.derived_type();
        let mut priced = price(&request, self.config.currency)?;

        let mut uow = self.store.begin().await?;
        let mut customer = uow.lock_retail_customer(request.customer_id).await?;
        let sequence = uow.next_bill_sequence(instant.date).await?;
        let bill_sno = self.config.b2c_bills.compose(instant.date, sequence)?;
        let id = RetailTransactionId::new_v7();
        let now = Utc::now();

        // Returns before deposits, in holdings and cylinders alike, so a
        // same-bill deposit is never consumed by its own return
        for item in &priced.security_items {
            match item.direction {
                SecurityDirection::Return { deduction_per_item } => {
                    return_holdings(uow.as_mut(), customer.id, item, deduction_per_item, instant.date, id).await?;
                }
                SecurityDirection::Deposit => {}
            }
        }
        for item in priced.security_items.iter().filter(|i| !i.is_return()) {
            let holding = CylinderHolding {
                id: HoldingId::new_v7(),
                customer_id: customer.id,
                cylinder_type: item.cylinder_type,
                quantity: item.quantity,
                security_amount: item.price_per_item,
                issue_date: instant.date,
                is_returned: false,
                return_date: None,
                return_deduction: None,
                issued_by_transaction: id,
                returned_by_transaction: None,
            };
            uow.insert_holding(&holding).await?;
        }

        {
            let mut adjuster = InventoryAdjuster::new(uow.as_mut(), bill_sno.clone(), now);
            let holder = CylinderHolder::B2c(customer.id);
            for item in priced.security_items.iter().filter(|i| i.is_return()) {
                adjuster
                    .collect_from_holder(holder, item.cylinder_type, item.quantity, TransactionRef::B2c(id))
                    .await?;
            }
            for item in priced.security_items.iter().filter(|i| !i.is_return()) {
                adjuster
                    .issue_to_holder(holder, &customer.name, item.cylinder_type, item.quantity)
                    .await?;
            }
            for item in priced.accessory_items.iter_mut() {
                item.stock_source = adjuster
                    .deduct_retail_stock(&item.name, &item.item_type, item.quantity)
                    .await?;
            }
        }

        let profit_before = customer.total_profit;
        customer.total_profit = customer.total_profit.checked_add(&priced.profit)?.clamp_non_negative();
        customer.updated_at = now;

        let final_amount = priced.total.checked_add(&priced.delivery)?;
        let transaction = RetailTransaction {
            id,
            bill_sno,
            transaction_type,
            customer_id: customer.id,
            transaction_at: instant.at,
            bill_date: instant.date,
            gas_items: priced.gas_items,
            security_items: priced.security_items,
            accessory_items: priced.accessory_items,
            total_amount: priced.total,
            delivery_charges: priced.delivery,
            final_amount,
            actual_profit: priced.profit,
            payment_method: request.payment_method,
            notes: request.notes,
            created_by: actor.clone(),
            created_at: now,
            void: None,
        };

        uow.insert_retail_transaction(&transaction).await?;
        uow.save_retail_customer_profit(&customer).await?;
        uow.commit().await?;

        info!(
            bill_sno = %transaction.bill_sno,
            transaction_type = %transaction.transaction_type,
            customer = %customer.name,
            final_amount = %transaction.final_amount,
            profit_before = %profit_before,
            profit_after = %customer.total_profit,
            "Retail transaction recorded"
        );

        Ok(transaction)
    }
}

/// Marks open holdings returned, oldest first, splitting the last one if needed
async fn return_holdings(
    uow: &mut dyn LedgerUnitOfWork,
    customer_id: RetailCustomerId,
    item: &SecurityItem,
    deduction_per_item: Money,
    date: NaiveDate,
    by: RetailTransactionId,
) -> Result<(), LedgerError> {
    let open = uow.open_holdings(customer_id, item.cylinder_type).await?;
    let held: u32 = open.iter().map(|h| h.quantity).sum();
    if held < item.quantity {
        return Err(LedgerError::validation(format!(
            "Customer holds {} {} cylinders on deposit, cannot return {}",
            held, item.cylinder_type, item.quantity
        )));
    }

    let mut remaining = item.quantity;
    for mut holding in open {
        if remaining == 0 {
            break;
        }
        if holding.quantity <= remaining {
            remaining -= holding.quantity;
            holding.mark_returned(date, deduction_per_item, by);
            uow.save_holding(&holding).await?;
        } else {
            let mut returned = holding.clone();
            returned.id = HoldingId::new_v7();
            returned.quantity = remaining;
            returned.mark_returned(date, deduction_per_item, by);
            holding.quantity -= remaining;
            uow.save_holding(&holding).await?;
            uow.insert_holding(&returned).await?;
            remaining = 0;
        }
    }
    Ok(())
}

fn non_negative(amount: &Money, what: &str, currency: Currency) -> Result<(), LedgerError> {
    ensure_currency(amount, currency)?;
    if amount.is_negative() {
        return Err(LedgerError::validation(format!("{} cannot be negative", what)));
    }
    Ok(())
}

fn price(request: &RecordRetailTransaction, currency: Currency) -> Result<PricedRetail, LedgerError> {
    if request.is_empty() {
        return Err(LedgerError::validation("Transaction must have at least one item"));
    }

    let zero = Money::zero(currency);
    let mut total = zero;
    let mut profit = zero;

    let mut gas_items = Vec::with_capacity(request.gas_items.len());
    for item in &request.gas_items {
        let quantity = checked_quantity(item.quantity)?;
        non_negative(&item.price_per_item, "Gas price", currency)?;
        non_negative(&item.cost_per_item, "Gas cost", currency)?;
        let units = Decimal::from(quantity);
        let line = item.price_per_item.multiply(units);
        total = total.checked_add(&line)?;
        profit = profit.checked_add(&item.price_per_item.checked_sub(&item.cost_per_item)?.multiply(units))?;
        gas_items.push(GasItem {
            id: RetailItemId::new_v7(),
            cylinder_type: item.cylinder_type,
            quantity,
            price_per_item: item.price_per_item,
            cost_per_item: item.cost_per_item,
            total_price: line,
        });
    }

    let mut security_items = Vec::with_capacity(request.security_items.len());
    for item in &request.security_items {
        let quantity = checked_quantity(item.quantity)?;
        non_negative(&item.price_per_item, "Security amount", currency)?;
        let units = Decimal::from(quantity);
        let line = match item.direction {
            SecurityDirection::Deposit => item.price_per_item.multiply(units),
            SecurityDirection::Return { deduction_per_item } => {
                non_negative(&deduction_per_item, "Return deduction", currency)?;
                if deduction_per_item.amount() > item.price_per_item.amount() {
                    return Err(LedgerError::validation(format!(
                        "Return deduction {} exceeds the security amount {}",
                        deduction_per_item, item.price_per_item
                    )));
                }
                profit = profit.checked_add(&deduction_per_item.multiply(units))?;
                -item.price_per_item.checked_sub(&deduction_per_item)?.multiply(units)
            }
        };
        total = total.checked_add(&line)?;
        security_items.push(SecurityItem {
            id: RetailItemId::new_v7(),
            cylinder_type: item.cylinder_type,
            quantity,
            price_per_item: item.price_per_item,
            direction: item.direction,
            total_price: line,
        });
    }

    let mut accessory_items = Vec::with_capacity(request.accessory_items.len());
    for item in &request.accessory_items {
        let quantity = checked_quantity(item.quantity)?;
        if item.name.trim().is_empty() {
            return Err(LedgerError::validation("Accessory name is required"));
        }
        non_negative(&item.price_per_item, "Accessory price", currency)?;
        non_negative(&item.cost_per_item, "Accessory cost", currency)?;
        let units = Decimal::from(quantity);
        let line = item.price_per_item.multiply(units);
        total = total.checked_add(&line)?;
        profit = profit.checked_add(&item.price_per_item.checked_sub(&item.cost_per_item)?.multiply(units))?;
        accessory_items.push(AccessoryItem {
            id: RetailItemId::new_v7(),
            name: item.name.trim().to_string(),
            item_type: item.item_type.trim().to_string(),
            quantity,
            price_per_item: item.price_per_item,
            cost_per_item: item.cost_per_item,
            total_price: line,
            stock_source: StockSource::Untracked,
        });
    }

    let delivery = request.delivery_charges.unwrap_or(zero);
    non_negative(&delivery, "Delivery charges", currency)?;

    Ok(PricedRetail {
        gas_items,
        security_items,
        accessory_items,
        total,
        delivery,
        profit,
    })
}
