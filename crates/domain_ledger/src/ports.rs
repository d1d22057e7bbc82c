//! Ledger Store Ports
//!
//! The recorder and reverser run every operation inside one atomic unit of
//! work obtained from a `LedgerStore`. Two adapters implement the ports:
//!
//! - **PostgreSQL** (`infra_db::PostgresLedgerStore`): one database
//!   transaction per unit of work, `SELECT ... FOR UPDATE` on customer and
//!   transaction rows
//! - **In-memory** (`mock::MockLedgerStore`, behind the `mock` feature): one
//!   async mutex guard per unit of work over a working copy of the state
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut uow = store.begin().await?;
//! let mut customer = uow.lock_customer(customer_id).await?;
//! // ... mutate ...
//! uow.save_customer_ledger(&customer).await?;
//! uow.commit().await?;
//! ```
//!
//! Dropping a unit of work without calling `commit` discards every write
//! made through it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{
    CustomItemId, CustomerId, CylinderId, DomainPort, HealthCheckable, HoldingId, PortError,
    ProductId, RetailCustomerId, RetailTransactionId, TransactionId,
};

use crate::customer::Customer;
use crate::cylinder::{Cylinder, CylinderMove, CylinderQuery, CylinderType};
use crate::product::{CustomItem, Product};
use crate::retail::model::{CylinderHolding, RetailCustomer, RetailTransaction};
use crate::transaction::{LedgerTransaction, VoidRecord};

/// Source of atomic units of work over the ledger tables
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Starts a new unit of work
    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, PortError>;
}

/// One atomic unit of work
///
/// Reads through `lock_*` hold their row until the unit of work ends.
#[async_trait]
pub trait LedgerUnitOfWork: Send {
    /// Increments the bill counter of `bill_date`, creating it at 1
    async fn next_bill_sequence(&mut self, bill_date: NaiveDate) -> Result<u32, PortError>;

    // ---- B2B customers and transactions ----

    async fn lock_customer(&mut self, id: CustomerId) -> Result<Customer, PortError>;

    /// Writes back `ledger_balance`, `dues` and `updated_at`
    async fn save_customer_ledger(&mut self, customer: &Customer) -> Result<(), PortError>;

    async fn insert_transaction(&mut self, transaction: &LedgerTransaction) -> Result<(), PortError>;

    async fn lock_transaction(&mut self, id: TransactionId) -> Result<LedgerTransaction, PortError>;

    async fn mark_transaction_voided(
        &mut self,
        id: TransactionId,
        void: &VoidRecord,
    ) -> Result<(), PortError>;

    /// All transactions of a customer, voided included, in chronological order
    async fn customer_transactions(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Vec<LedgerTransaction>, PortError>;

    // ---- Cylinders ----

    async fn find_cylinders(&mut self, query: &CylinderQuery) -> Result<Vec<Cylinder>, PortError>;

    async fn move_cylinders(
        &mut self,
        ids: &[CylinderId],
        movement: &CylinderMove,
        at: DateTime<Utc>,
    ) -> Result<(), PortError>;

    async fn create_cylinder(&mut self, cylinder: &Cylinder) -> Result<(), PortError>;

    // ---- Accessory stock ----

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, PortError>;

    /// Case-insensitive exact name match
    async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>, PortError>;

    /// Case-insensitive containment match, ordered by name
    async fn search_products(&mut self, fragment: &str) -> Result<Vec<Product>, PortError>;

    /// Adds `delta` to the stock and returns the new quantity
    ///
    /// Fails with `PortError::Validation` instead of going below zero.
    async fn adjust_product_stock(&mut self, id: ProductId, delta: i64) -> Result<i64, PortError>;

    async fn find_custom_item(
        &mut self,
        name: &str,
        item_type: &str,
    ) -> Result<Option<CustomItem>, PortError>;

    /// Same contract as `adjust_product_stock`
    async fn adjust_custom_item_quantity(
        &mut self,
        id: CustomItemId,
        delta: i64,
    ) -> Result<i64, PortError>;

    // ---- B2C ----

    async fn lock_retail_customer(&mut self, id: RetailCustomerId) -> Result<RetailCustomer, PortError>;

    async fn save_retail_customer_profit(&mut self, customer: &RetailCustomer) -> Result<(), PortError>;

    async fn insert_retail_transaction(
        &mut self,
        transaction: &RetailTransaction,
    ) -> Result<(), PortError>;

    async fn lock_retail_transaction(
        &mut self,
        id: RetailTransactionId,
    ) -> Result<RetailTransaction, PortError>;

    async fn mark_retail_transaction_voided(
        &mut self,
        id: RetailTransactionId,
        void: &VoidRecord,
    ) -> Result<(), PortError>;

    async fn insert_holding(&mut self, holding: &CylinderHolding) -> Result<(), PortError>;

    /// Unreturned holdings of a customer for one type, oldest first
    async fn open_holdings(
        &mut self,
        customer_id: RetailCustomerId,
        cylinder_type: CylinderType,
    ) -> Result<Vec<CylinderHolding>, PortError>;

    async fn holdings_issued_by(
        &mut self,
        transaction_id: RetailTransactionId,
    ) -> Result<Vec<CylinderHolding>, PortError>;

    /// Returned holdings matching customer, type, return date and returning transaction
    async fn holdings_returned_by(
        &mut self,
        customer_id: RetailCustomerId,
        cylinder_type: CylinderType,
        return_date: NaiveDate,
        transaction_id: RetailTransactionId,
    ) -> Result<Vec<CylinderHolding>, PortError>;

    async fn save_holding(&mut self, holding: &CylinderHolding) -> Result<(), PortError>;

    async fn delete_holdings(&mut self, ids: &[HoldingId]) -> Result<(), PortError>;

    /// Makes every write of this unit of work durable
    async fn commit(&mut self) -> Result<(), PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use crate::product::{name_contains, same_name};

    /// Everything the in-memory store holds
    #[derive(Debug, Clone, Default)]
    pub struct LedgerState {
        pub customers: HashMap<CustomerId, Customer>,
        pub transactions: HashMap<TransactionId, LedgerTransaction>,
        /// Kept in creation order
        pub cylinders: Vec<Cylinder>,
        pub products: HashMap<ProductId, Product>,
        pub custom_items: HashMap<CustomItemId, CustomItem>,
        pub bill_sequences: HashMap<NaiveDate, u32>,
        pub retail_customers: HashMap<RetailCustomerId, RetailCustomer>,
        pub retail_transactions: HashMap<RetailTransactionId, RetailTransaction>,
        /// Kept in creation order
        pub holdings: Vec<CylinderHolding>,
    }

    /// In-memory implementation of LedgerStore
    ///
    /// Units of work are serialised: `begin` waits for the previous unit to
    /// finish, then works on a copy that replaces the shared state on commit.
    #[derive(Debug, Default, Clone)]
    pub struct MockLedgerStore {
        state: Arc<Mutex<LedgerState>>,
        fail_next_commit: Arc<AtomicBool>,
    }

    impl MockLedgerStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates the store
        pub fn with_state(state: LedgerState) -> Self {
            Self {
                state: Arc::new(Mutex::new(state)),
                fail_next_commit: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Makes the next `commit` fail with a connection error
        pub fn fail_next_commit(&self) {
            self.fail_next_commit.store(true, Ordering::SeqCst);
        }

        /// A copy of the committed state
        pub async fn snapshot(&self) -> LedgerState {
            self.state.lock().await.clone()
        }

        pub async fn insert_customer(&self, customer: Customer) {
            self.state.lock().await.customers.insert(customer.id, customer);
        }

        pub async fn insert_cylinder(&self, cylinder: Cylinder) {
            self.state.lock().await.cylinders.push(cylinder);
        }

        pub async fn insert_product(&self, product: Product) {
            self.state.lock().await.products.insert(product.id, product);
        }

        pub async fn insert_custom_item(&self, item: CustomItem) {
            self.state.lock().await.custom_items.insert(item.id, item);
        }

        pub async fn insert_retail_customer(&self, customer: RetailCustomer) {
            self.state.lock().await.retail_customers.insert(customer.id, customer);
        }

        pub async fn insert_holding(&self, holding: CylinderHolding) {
            self.state.lock().await.holdings.push(holding);
        }

        pub async fn customer(&self, id: CustomerId) -> Option<Customer> {
            self.state.lock().await.customers.get(&id).cloned()
        }

        pub async fn retail_customer(&self, id: RetailCustomerId) -> Option<RetailCustomer> {
            self.state.lock().await.retail_customers.get(&id).cloned()
        }

        pub async fn product(&self, id: ProductId) -> Option<Product> {
            self.state.lock().await.products.get(&id).cloned()
        }

        pub async fn cylinders(&self) -> Vec<Cylinder> {
            self.state.lock().await.cylinders.clone()
        }

        /// Drops every cylinder for which `keep` is false
        pub async fn retain_cylinders(&self, keep: impl Fn(&Cylinder) -> bool) {
            self.state.lock().await.cylinders.retain(|c| keep(c));
        }
    }

    impl DomainPort for MockLedgerStore {}

    #[async_trait]
    impl HealthCheckable for MockLedgerStore {
        async fn health_check(&self) -> core_kernel::HealthCheckResult {
            core_kernel::HealthCheckResult {
                adapter_id: "mock-ledger-store".to_string(),
                status: core_kernel::AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for MockLedgerStore {
        async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, PortError> {
            let guard = self.state.clone().lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(MockUnitOfWork {
                guard: Some(guard),
                working,
                fail_next_commit: self.fail_next_commit.clone(),
            }))
        }
    }

    struct MockUnitOfWork {
        guard: Option<OwnedMutexGuard<LedgerState>>,
        working: LedgerState,
        fail_next_commit: Arc<AtomicBool>,
    }

    impl MockUnitOfWork {
        fn ensure_open(&self) -> Result<(), PortError> {
            if self.guard.is_none() {
                return Err(PortError::internal("Unit of work already committed"));
            }
            Ok(())
        }
    }

    fn adjust(stock: &mut i64, delta: i64, what: &str) -> Result<i64, PortError> {
        let next = *stock + delta;
        if next < 0 {
            return Err(PortError::validation(format!(
                "Insufficient stock for {}: {} available, {} requested",
                what, stock, -delta
            )));
        }
        *stock = next;
        Ok(next)
    }

    #[async_trait]
    impl LedgerUnitOfWork for MockUnitOfWork {
        async fn next_bill_sequence(&mut self, bill_date: NaiveDate) -> Result<u32, PortError> {
            self.ensure_open()?;
            let sequence = self.working.bill_sequences.entry(bill_date).or_insert(0);
            *sequence += 1;
            Ok(*sequence)
        }

        async fn lock_customer(&mut self, id: CustomerId) -> Result<Customer, PortError> {
            self.ensure_open()?;
            self.working
                .customers
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", id))
        }

        async fn save_customer_ledger(&mut self, customer: &Customer) -> Result<(), PortError> {
            self.ensure_open()?;
            let stored = self
                .working
                .customers
                .get_mut(&customer.id)
                .ok_or_else(|| PortError::not_found("Customer", customer.id))?;
            stored.ledger_balance = customer.ledger_balance;
            stored.dues = customer.dues;
            stored.updated_at = customer.updated_at;
            Ok(())
        }

        async fn insert_transaction(&mut self, transaction: &LedgerTransaction) -> Result<(), PortError> {
            self.ensure_open()?;
            if self.working.transactions.values().any(|t| t.bill_sno == transaction.bill_sno) {
                return Err(PortError::conflict(format!(
                    "Bill number {} already exists",
                    transaction.bill_sno
                )));
            }
            self.working.transactions.insert(transaction.id, transaction.clone());
            Ok(())
        }

        async fn lock_transaction(&mut self, id: TransactionId) -> Result<LedgerTransaction, PortError> {
            self.ensure_open()?;
            self.working
                .transactions
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Transaction", id))
        }

        async fn mark_transaction_voided(
            &mut self,
            id: TransactionId,
            void: &VoidRecord,
        ) -> Result<(), PortError> {
            self.ensure_open()?;
            let transaction = self
                .working
                .transactions
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Transaction", id))?;
            transaction.void = Some(void.clone());
            Ok(())
        }

        async fn customer_transactions(
            &mut self,
            customer_id: CustomerId,
        ) -> Result<Vec<LedgerTransaction>, PortError> {
            self.ensure_open()?;
            let mut transactions: Vec<_> = self
                .working
                .transactions
                .values()
                .filter(|t| t.customer_id == customer_id)
                .cloned()
                .collect();
            transactions.sort_by(|a, b| {
                a.transaction_at
                    .cmp(&b.transaction_at)
                    .then_with(|| a.bill_sno.cmp(&b.bill_sno))
            });
            Ok(transactions)
        }

        async fn find_cylinders(&mut self, query: &CylinderQuery) -> Result<Vec<Cylinder>, PortError> {
            self.ensure_open()?;
            let matching = self.working.cylinders.iter().filter(|c| query.matches(c)).cloned();
            Ok(match query.limit {
                Some(limit) => matching.take(limit).collect(),
                None => matching.collect(),
            })
        }

        async fn move_cylinders(
            &mut self,
            ids: &[CylinderId],
            movement: &CylinderMove,
            at: DateTime<Utc>,
        ) -> Result<(), PortError> {
            self.ensure_open()?;
            for cylinder in self.working.cylinders.iter_mut().filter(|c| ids.contains(&c.id)) {
                movement.apply(cylinder, at);
            }
            Ok(())
        }

        async fn create_cylinder(&mut self, cylinder: &Cylinder) -> Result<(), PortError> {
            self.ensure_open()?;
            self.working.cylinders.push(cylinder.clone());
            Ok(())
        }

        async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, PortError> {
            self.ensure_open()?;
            Ok(self.working.products.get(&id).cloned())
        }

        async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>, PortError> {
            self.ensure_open()?;
            Ok(self
                .working
                .products
                .values()
                .find(|p| same_name(&p.name, name))
                .cloned())
        }

        async fn search_products(&mut self, fragment: &str) -> Result<Vec<Product>, PortError> {
            self.ensure_open()?;
            let mut products: Vec<_> = self
                .working
                .products
                .values()
                .filter(|p| name_contains(&p.name, fragment))
                .cloned()
                .collect();
            products.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(products)
        }

        async fn adjust_product_stock(&mut self, id: ProductId, delta: i64) -> Result<i64, PortError> {
            self.ensure_open()?;
            let product = self
                .working
                .products
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Product", id))?;
            let name = product.name.clone();
            product.updated_at = Utc::now();
            adjust(&mut product.stock_quantity, delta, &name)
        }

        async fn find_custom_item(
            &mut self,
            name: &str,
            item_type: &str,
        ) -> Result<Option<CustomItem>, PortError> {
            self.ensure_open()?;
            Ok(self
                .working
                .custom_items
                .values()
                .find(|i| same_name(&i.name, name) && same_name(&i.item_type, item_type))
                .cloned())
        }

        async fn adjust_custom_item_quantity(
            &mut self,
            id: CustomItemId,
            delta: i64,
        ) -> Result<i64, PortError> {
            self.ensure_open()?;
            let item = self
                .working
                .custom_items
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("CustomItem", id))?;
            let name = item.name.clone();
            item.updated_at = Utc::now();
            adjust(&mut item.quantity, delta, &name)
        }

        async fn lock_retail_customer(&mut self, id: RetailCustomerId) -> Result<RetailCustomer, PortError> {
            self.ensure_open()?;
            self.working
                .retail_customers
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("RetailCustomer", id))
        }

        async fn save_retail_customer_profit(&mut self, customer: &RetailCustomer) -> Result<(), PortError> {
            self.ensure_open()?;
            let stored = self
                .working
                .retail_customers
                .get_mut(&customer.id)
                .ok_or_else(|| PortError::not_found("RetailCustomer", customer.id))?;
            stored.total_profit = customer.total_profit;
            stored.updated_at = customer.updated_at;
            Ok(())
        }

        async fn insert_retail_transaction(
            &mut self,
            transaction: &RetailTransaction,
        ) -> Result<(), PortError> {
            self.ensure_open()?;
            self.working
                .retail_transactions
                .insert(transaction.id, transaction.clone());
            Ok(())
        }

        async fn lock_retail_transaction(
            &mut self,
            id: RetailTransactionId,
        ) -> Result<RetailTransaction, PortError> {
            self.ensure_open()?;
            self.working
                .retail_transactions
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("RetailTransaction", id))
        }

        async fn mark_retail_transaction_voided(
            &mut self,
            id: RetailTransactionId,
            void: &VoidRecord,
        ) -> Result<(), PortError> {
            self.ensure_open()?;
            let transaction = self
                .working
                .retail_transactions
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("RetailTransaction", id))?;
            transaction.void = Some(void.clone());
            Ok(())
        }

        async fn insert_holding(&mut self, holding: &CylinderHolding) -> Result<(), PortError> {
            self.ensure_open()?;
            self.working.holdings.push(holding.clone());
            Ok(())
        }

        async fn open_holdings(
            &mut self,
            customer_id: RetailCustomerId,
            cylinder_type: CylinderType,
        ) -> Result<Vec<CylinderHolding>, PortError> {
            self.ensure_open()?;
            let mut holdings: Vec<_> = self
                .working
                .holdings
                .iter()
                .filter(|h| h.customer_id == customer_id && h.cylinder_type == cylinder_type && !h.is_returned)
                .cloned()
                .collect();
            // Stable sort keeps creation order within a day
            holdings.sort_by_key(|h| h.issue_date);
            Ok(holdings)
        }

        async fn holdings_issued_by(
            &mut self,
            transaction_id: RetailTransactionId,
        ) -> Result<Vec<CylinderHolding>, PortError> {
            self.ensure_open()?;
            Ok(self
                .working
                .holdings
                .iter()
                .filter(|h| h.issued_by_transaction == transaction_id)
                .cloned()
                .collect())
        }

        async fn holdings_returned_by(
            &mut self,
            customer_id: RetailCustomerId,
            cylinder_type: CylinderType,
            return_date: NaiveDate,
            transaction_id: RetailTransactionId,
        ) -> Result<Vec<CylinderHolding>, PortError> {
            self.ensure_open()?;
            Ok(self
                .working
                .holdings
                .iter()
                .filter(|h| {
                    h.customer_id == customer_id
                        && h.cylinder_type == cylinder_type
                        && h.is_returned
                        && h.return_date == Some(return_date)
                        && h.returned_by_transaction == Some(transaction_id)
                })
                .cloned()
                .collect())
        }

        async fn save_holding(&mut self, holding: &CylinderHolding) -> Result<(), PortError> {
            self.ensure_open()?;
            let stored = self
                .working
                .holdings
                .iter_mut()
                .find(|h| h.id == holding.id)
                .ok_or_else(|| PortError::not_found("CylinderHolding", holding.id))?;
            *stored = holding.clone();
            Ok(())
        }

        async fn delete_holdings(&mut self, ids: &[HoldingId]) -> Result<(), PortError> {
            self.ensure_open()?;
            self.working.holdings.retain(|h| !ids.contains(&h.id));
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), PortError> {
            let mut guard = self
                .guard
                .take()
                .ok_or_else(|| PortError::internal("Unit of work already committed"))?;
            if self.fail_next_commit.swap(false, Ordering::SeqCst) {
                return Err(PortError::connection("Simulated commit failure"));
            }
            *guard = std::mem::take(&mut self.working);
            Ok(())
        }
    }
}
