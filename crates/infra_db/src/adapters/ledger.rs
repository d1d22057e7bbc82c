//! PostgreSQL Ledger Store
//!
//! Implements the ledger domain's `LedgerStore` port on PostgreSQL. Each unit
//! of work wraps one database transaction:
//!
//! - rows read through `lock_*` are taken `FOR UPDATE`, so concurrent
//!   recordings and voids of the same customer or transaction serialise
//! - bill numbers come from an upsert on `bill_sequences`, which holds the
//!   day's counter row locked until commit
//! - dropping the unit of work without committing rolls everything back
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_ledger::{LedgerService, LedgerConfig};
//! use std::sync::Arc;
//!
//! let store = PostgresLedgerStore::new(pool, Currency::PKR);
//! let service = LedgerService::new(Arc::new(store), LedgerConfig::default());
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, Currency, CustomItemId, CustomerId, CylinderId, DomainPort, HealthCheckResult,
    HealthCheckable, HoldingId, PortError, ProductId, RetailCustomerId, RetailTransactionId,
    TransactionId,
};
use domain_ledger::retail::{CylinderHolding, RetailCustomer, RetailTransaction};
use domain_ledger::{
    CustomItem, Customer, Cylinder, CylinderMove, CylinderQuery, CylinderType, LedgerStore,
    LedgerTransaction, LedgerUnitOfWork, Product, VoidRecord,
};

use super::convert::*;
use crate::error::DatabaseError;
use crate::repositories::{LedgerRepository, RetailRepository};

/// PostgreSQL-backed implementation of `LedgerStore`
///
/// Holdings have no currency column of their own; they are read back in
/// the store's ledger currency.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    currency: Currency,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool, currency: Currency) -> Self {
        Self { pool, currency }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a customer outside of any ledger operation (onboarding, seeding)
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn insert_customer(&self, customer: &Customer) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        LedgerRepository::insert_customer(&mut conn, &customer_to_row(customer)?).await?;
        Ok(())
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn insert_retail_customer(&self, customer: &RetailCustomer) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        RetailRepository::insert_customer(&mut conn, &retail_customer_to_row(customer)).await?;
        Ok(())
    }

    #[instrument(skip(self, cylinder), fields(code = %cylinder.code))]
    pub async fn insert_cylinder(&self, cylinder: &Cylinder) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        LedgerRepository::insert_cylinder(&mut conn, &cylinder_to_row(cylinder)).await?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product = %product.name))]
    pub async fn insert_product(&self, product: &Product) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        LedgerRepository::insert_product(&mut conn, &product_to_row(product)).await?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item = %item.name))]
    pub async fn insert_custom_item(&self, item: &CustomItem) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        LedgerRepository::insert_custom_item(&mut conn, &custom_item_to_row(item)).await?;
        Ok(())
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Performs a `SELECT 1` to verify the pool is operational
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: "postgres-ledger-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: "postgres-ledger-store".to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, PortError> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Ok(Box::new(PgUnitOfWork {
            tx: Some(tx),
            currency: self.currency,
        }))
    }
}

/// One database transaction
struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
    currency: Currency,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> Result<&mut PgConnection, PortError> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(PortError::internal("Unit of work already committed")),
        }
    }

    async fn load_transactions(
        &mut self,
        headers: Vec<crate::repositories::ledger::TransactionRow>,
    ) -> Result<Vec<LedgerTransaction>, PortError> {
        let ids: Vec<Uuid> = headers.iter().map(|h| h.transaction_id).collect();
        let mut items_by_transaction: HashMap<Uuid, Vec<_>> = HashMap::new();
        for item in LedgerRepository::items_for(self.conn()?, &ids).await? {
            items_by_transaction.entry(item.transaction_id).or_default().push(item);
        }

        headers
            .into_iter()
            .map(|header| {
                let items = items_by_transaction.remove(&header.transaction_id).unwrap_or_default();
                rows_to_transaction(header, items).map_err(PortError::from)
            })
            .collect()
    }

    fn holdings(&self, rows: Vec<crate::repositories::retail::HoldingRow>) -> Result<Vec<CylinderHolding>, PortError> {
        rows.into_iter()
            .map(|row| row_to_holding(row, self.currency).map_err(PortError::from))
            .collect()
    }

    /// Distinguishes a missing row from insufficient stock after a guarded update
    fn stock_refused(entity: &str, id: impl std::fmt::Display, exists: bool, delta: i64) -> PortError {
        if exists {
            PortError::validation(format!(
                "Insufficient stock for {} {}: cannot apply {}",
                entity, id, delta
            ))
        } else {
            PortError::not_found(entity, id)
        }
    }
}

#[async_trait]
impl LedgerUnitOfWork for PgUnitOfWork {
    #[instrument(skip(self))]
    async fn next_bill_sequence(&mut self, bill_date: NaiveDate) -> Result<u32, PortError> {
        let sequence = LedgerRepository::next_bill_sequence(self.conn()?, bill_date).await?;
        u32::try_from(sequence).map_err(|_| PortError::internal("Bill sequence out of range"))
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    async fn lock_customer(&mut self, id: CustomerId) -> Result<Customer, PortError> {
        let row = LedgerRepository::lock_customer(self.conn()?, id.into())
            .await?
            .ok_or_else(|| PortError::not_found("Customer", id))?;
        Ok(row_to_customer(row)?)
    }

    async fn save_customer_ledger(&mut self, customer: &Customer) -> Result<(), PortError> {
        let dues = dues_to_columns(&customer.dues)?;
        let updated = LedgerRepository::update_customer_ledger(
            self.conn()?,
            customer.id.into(),
            customer.ledger_balance.amount(),
            dues,
            customer.updated_at,
        )
        .await?;
        if updated == 0 {
            return Err(PortError::not_found("Customer", customer.id));
        }
        Ok(())
    }

    #[instrument(skip(self, transaction), fields(bill_sno = %transaction.bill_sno))]
    async fn insert_transaction(&mut self, transaction: &LedgerTransaction) -> Result<(), PortError> {
        let (header, items) = transaction_to_rows(transaction)?;
        LedgerRepository::insert_transaction(self.conn()?, &header, &items).await?;
        debug!(items = items.len(), "Transaction inserted");
        Ok(())
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn lock_transaction(&mut self, id: TransactionId) -> Result<LedgerTransaction, PortError> {
        let header = LedgerRepository::lock_transaction(self.conn()?, id.into())
            .await?
            .ok_or_else(|| PortError::not_found("Transaction", id))?;
        let mut loaded = self.load_transactions(vec![header]).await?;
        loaded.pop().ok_or_else(|| PortError::not_found("Transaction", id))
    }

    async fn mark_transaction_voided(
        &mut self,
        id: TransactionId,
        void: &VoidRecord,
    ) -> Result<(), PortError> {
        let updated = LedgerRepository::mark_voided(
            self.conn()?,
            id.into(),
            void.voided_by.as_str(),
            void.voided_at,
            &void.reason,
        )
        .await?;
        if updated == 0 {
            return Err(PortError::conflict(format!("Transaction {} is already voided", id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn customer_transactions(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Vec<LedgerTransaction>, PortError> {
        let headers = LedgerRepository::customer_transactions(self.conn()?, customer_id.into()).await?;
        self.load_transactions(headers).await
    }

    async fn find_cylinders(&mut self, query: &CylinderQuery) -> Result<Vec<Cylinder>, PortError> {
        let rows = LedgerRepository::find_cylinders(self.conn()?, &query_to_filter(query)).await?;
        rows.into_iter()
            .map(|row| row_to_cylinder(row).map_err(PortError::from))
            .collect()
    }

    async fn move_cylinders(
        &mut self,
        ids: &[CylinderId],
        movement: &CylinderMove,
        at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        if ids.is_empty() {
            return Ok(());
        }
        let uuids: Vec<Uuid> = ids.iter().map(|id| Uuid::from(*id)).collect();
        let moved =
            LedgerRepository::place_cylinders(self.conn()?, &uuids, &move_to_placement(movement), at).await?;
        if moved != uuids.len() as u64 {
            return Err(PortError::conflict(format!(
                "Expected to move {} cylinders, moved {}",
                uuids.len(),
                moved
            )));
        }
        Ok(())
    }

    async fn create_cylinder(&mut self, cylinder: &Cylinder) -> Result<(), PortError> {
        LedgerRepository::insert_cylinder(self.conn()?, &cylinder_to_row(cylinder)).await?;
        Ok(())
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, PortError> {
        let row = LedgerRepository::get_product(self.conn()?, id.into()).await?;
        Ok(row.map(row_to_product).transpose()?)
    }

    async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>, PortError> {
        let row = LedgerRepository::find_product_by_name(self.conn()?, name).await?;
        Ok(row.map(row_to_product).transpose()?)
    }

    async fn search_products(&mut self, fragment: &str) -> Result<Vec<Product>, PortError> {
        let rows = LedgerRepository::search_products(self.conn()?, fragment).await?;
        rows.into_iter()
            .map(|row| row_to_product(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn adjust_product_stock(&mut self, id: ProductId, delta: i64) -> Result<i64, PortError> {
        let adjusted =
            LedgerRepository::adjust_product_stock(self.conn()?, id.into(), delta, Utc::now()).await?;
        match adjusted {
            Some(quantity) => Ok(quantity),
            None => {
                let exists = LedgerRepository::get_product(self.conn()?, id.into()).await?.is_some();
                Err(Self::stock_refused("Product", id, exists, delta))
            }
        }
    }

    async fn find_custom_item(
        &mut self,
        name: &str,
        item_type: &str,
    ) -> Result<Option<CustomItem>, PortError> {
        let row = LedgerRepository::find_custom_item(self.conn()?, name, item_type).await?;
        Ok(row.map(row_to_custom_item).transpose()?)
    }

    #[instrument(skip(self), fields(custom_item_id = %id))]
    async fn adjust_custom_item_quantity(
        &mut self,
        id: CustomItemId,
        delta: i64,
    ) -> Result<i64, PortError> {
        let adjusted =
            LedgerRepository::adjust_custom_item_quantity(self.conn()?, id.into(), delta, Utc::now())
                .await?;
        match adjusted {
            Some(quantity) => Ok(quantity),
            None => {
                let exists = LedgerRepository::get_custom_item(self.conn()?, id.into())
                    .await?
                    .is_some();
                Err(Self::stock_refused("CustomItem", id, exists, delta))
            }
        }
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    async fn lock_retail_customer(&mut self, id: RetailCustomerId) -> Result<RetailCustomer, PortError> {
        let row = RetailRepository::lock_customer(self.conn()?, id.into())
            .await?
            .ok_or_else(|| PortError::not_found("RetailCustomer", id))?;
        Ok(row_to_retail_customer(row)?)
    }

    async fn save_retail_customer_profit(&mut self, customer: &RetailCustomer) -> Result<(), PortError> {
        let updated = RetailRepository::update_profit(
            self.conn()?,
            customer.id.into(),
            customer.total_profit.amount(),
            customer.updated_at,
        )
        .await?;
        if updated == 0 {
            return Err(PortError::not_found("RetailCustomer", customer.id));
        }
        Ok(())
    }

    #[instrument(skip(self, transaction), fields(bill_sno = %transaction.bill_sno))]
    async fn insert_retail_transaction(
        &mut self,
        transaction: &RetailTransaction,
    ) -> Result<(), PortError> {
        let record = retail_transaction_to_record(transaction)?;
        RetailRepository::insert_transaction(self.conn()?, &record).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn lock_retail_transaction(
        &mut self,
        id: RetailTransactionId,
    ) -> Result<RetailTransaction, PortError> {
        let record = RetailRepository::lock_transaction(self.conn()?, id.into())
            .await?
            .ok_or_else(|| PortError::not_found("RetailTransaction", id))?;
        Ok(record_to_retail_transaction(record)?)
    }

    async fn mark_retail_transaction_voided(
        &mut self,
        id: RetailTransactionId,
        void: &VoidRecord,
    ) -> Result<(), PortError> {
        let updated = RetailRepository::mark_voided(
            self.conn()?,
            id.into(),
            void.voided_by.as_str(),
            void.voided_at,
            &void.reason,
        )
        .await?;
        if updated == 0 {
            return Err(PortError::conflict(format!("Retail transaction {} is already voided", id)));
        }
        Ok(())
    }

    async fn insert_holding(&mut self, holding: &CylinderHolding) -> Result<(), PortError> {
        RetailRepository::insert_holding(self.conn()?, &holding_to_row(holding)?).await?;
        Ok(())
    }

    async fn open_holdings(
        &mut self,
        customer_id: RetailCustomerId,
        cylinder_type: CylinderType,
    ) -> Result<Vec<CylinderHolding>, PortError> {
        let rows = RetailRepository::open_holdings(
            self.conn()?,
            customer_id.into(),
            cylinder_type_to_db(cylinder_type),
        )
        .await?;
        self.holdings(rows)
    }

    async fn holdings_issued_by(
        &mut self,
        transaction_id: RetailTransactionId,
    ) -> Result<Vec<CylinderHolding>, PortError> {
        let rows = RetailRepository::holdings_issued_by(self.conn()?, transaction_id.into()).await?;
        self.holdings(rows)
    }

    async fn holdings_returned_by(
        &mut self,
        customer_id: RetailCustomerId,
        cylinder_type: CylinderType,
        return_date: NaiveDate,
        transaction_id: RetailTransactionId,
    ) -> Result<Vec<CylinderHolding>, PortError> {
        let rows = RetailRepository::holdings_returned_by(
            self.conn()?,
            customer_id.into(),
            cylinder_type_to_db(cylinder_type),
            return_date,
            transaction_id.into(),
        )
        .await?;
        self.holdings(rows)
    }

    async fn save_holding(&mut self, holding: &CylinderHolding) -> Result<(), PortError> {
        let updated = RetailRepository::update_holding(self.conn()?, &holding_to_row(holding)?).await?;
        if updated == 0 {
            return Err(PortError::not_found("CylinderHolding", holding.id));
        }
        Ok(())
    }

    async fn delete_holdings(&mut self, ids: &[HoldingId]) -> Result<(), PortError> {
        if ids.is_empty() {
            return Ok(());
        }
        let uuids: Vec<Uuid> = ids.iter().map(|id| Uuid::from(*id)).collect();
        RetailRepository::delete_holdings(self.conn()?, &uuids).await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), PortError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| PortError::internal("Unit of work already committed"))?;
        tx.commit()
            .await
            .map_err(|e| PortError::from(DatabaseError::from(e)))
    }
}
