//! Inventory Adjuster
//!
//! Applies the physical side of a transaction: accessory stock counts and
//! cylinder status/location/holder. Stock deductions are strict (a shortfall
//! fails the unit of work); cylinder movements are best effort and report a
//! `ReconciliationWarning` when fewer cylinders match than were expected.
//! Reversals decide what to do with the warnings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use core_kernel::{CylinderId, ProductId};

use crate::cylinder::{
    CylinderHolder, CylinderLocation, CylinderMove, CylinderQuery, CylinderStatus, CylinderType,
    NewCylinder, TransactionRef,
};
use crate::error::LedgerError;
use crate::ports::LedgerUnitOfWork;
use crate::product::StockSource;

/// Physical inventory that could not be matched during an adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationWarning {
    pub bill_sno: String,
    /// What was being moved, e.g. "DOMESTIC_11_8KG cylinders held by customer"
    pub subject: String,
    pub expected: u32,
    pub found: u32,
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {} {}, found {}",
            self.bill_sno, self.expected, self.subject, self.found
        )
    }
}

/// Inventory changes of one transaction, applied through its unit of work
pub struct InventoryAdjuster<'a> {
    uow: &'a mut dyn LedgerUnitOfWork,
    bill_sno: String,
    at: DateTime<Utc>,
    created: u32,
    warnings: Vec<ReconciliationWarning>,
}

impl<'a> InventoryAdjuster<'a> {
    pub fn new(uow: &'a mut dyn LedgerUnitOfWork, bill_sno: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            uow,
            bill_sno: bill_sno.into(),
            at,
            created: 0,
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[ReconciliationWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ReconciliationWarning> {
        self.warnings
    }

    // ---- Accessory stock ----

    /// Deducts a sold accessory from the catalogue
    ///
    /// Resolves the product by id, else by case-insensitive exact name.
    /// Returns `None` for untracked accessories.
    pub async fn deduct_product(
        &mut self,
        product_id: Option<ProductId>,
        name: &str,
        quantity: u32,
    ) -> Result<Option<ProductId>, LedgerError> {
        let product = match product_id {
            Some(id) => Some(
                self.uow
                    .get_product(id)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("Product", id))?,
            ),
            None => self.uow.find_product_by_name(name).await?,
        };

        let Some(product) = product else {
            debug!(bill_sno = %self.bill_sno, accessory = %name, "Untracked accessory");
            return Ok(None);
        };

        if product.stock_quantity < i64::from(quantity) {
            return Err(LedgerError::validation(format!(
                "Insufficient stock for {}: {} available, {} requested",
                product.name, product.stock_quantity, quantity
            )));
        }
        self.uow.adjust_product_stock(product.id, -i64::from(quantity)).await?;
        Ok(Some(product.id))
    }

    /// Deducts a retail accessory: custom item by name and type, else a
    /// product whose name contains the accessory name
    pub async fn deduct_retail_stock(
        &mut self,
        name: &str,
        item_type: &str,
        quantity: u32,
    ) -> Result<StockSource, LedgerError> {
        let delta = -i64::from(quantity);
        if let Some(item) = self.uow.find_custom_item(name, item_type).await? {
            self.uow.adjust_custom_item_quantity(item.id, delta).await?;
            return Ok(StockSource::CustomItem(item.id));
        }
        if let Some(product) = self.uow.search_products(name).await?.into_iter().next() {
            self.uow.adjust_product_stock(product.id, delta).await?;
            return Ok(StockSource::Product(product.id));
        }
        debug!(bill_sno = %self.bill_sno, accessory = %name, "Untracked retail accessory");
        Ok(StockSource::Untracked)
    }

    /// Puts stock back into the table it was taken from
    pub async fn restore_stock(&mut self, source: StockSource, name: &str, quantity: u32) -> Result<(), LedgerError> {
        let delta = i64::from(quantity);
        let restored = match source {
            StockSource::Product(id) => match self.uow.adjust_product_stock(id, delta).await {
                Err(e) if e.is_not_found() => false,
                other => other.map(|_| true)?,
            },
            StockSource::CustomItem(id) => match self.uow.adjust_custom_item_quantity(id, delta).await {
                Err(e) if e.is_not_found() => false,
                other => other.map(|_| true)?,
            },
            StockSource::Untracked => true,
        };
        if !restored {
            self.shortfall(format!("units of {} (stock record removed)", name), quantity, 0);
        }
        Ok(())
    }

    // ---- Cylinders ----

    /// Creates one EMPTY cylinder per unit returned by a customer
    pub async fn receive_returned(
        &mut self,
        source: TransactionRef,
        cylinder_type: CylinderType,
        quantity: u32,
    ) -> Result<Vec<CylinderId>, LedgerError> {
        let mut ids = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            self.created += 1;
            let cylinder = NewCylinder {
                code: format!("{}-E{:02}", self.bill_sno, self.created),
                cylinder_type,
                status: CylinderStatus::Empty,
                location: CylinderLocation::ReturnedFromCustomer,
                holder: None,
                source_transaction: Some(source),
            }
            .into_cylinder(self.at);
            self.uow.create_cylinder(&cylinder).await?;
            ids.push(cylinder.id);
        }
        Ok(ids)
    }

    /// Sends EMPTY cylinders that came back through `source` out to the customer again
    ///
    /// Prefers the cylinders `source` returned, then any at "Store - Ready for Refill".
    pub async fn reissue_returned(
        &mut self,
        source: TransactionRef,
        cylinder_type: CylinderType,
        quantity: u32,
        holder: CylinderHolder,
        customer_name: &str,
    ) -> Result<u32, LedgerError> {
        let mut ids: Vec<CylinderId> = self
            .uow
            .find_cylinders(
                &CylinderQuery::of(cylinder_type, CylinderStatus::Empty)
                    .from_transaction(source)
                    .limit(quantity as usize),
            )
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        if ids.len() < quantity as usize {
            let refill = self
                .uow
                .find_cylinders(
                    &CylinderQuery::of(cylinder_type, CylinderStatus::Empty)
                        .at(CylinderLocation::StoreReadyForRefill),
                )
                .await?;
            let missing = quantity as usize - ids.len();
            let extra: Vec<CylinderId> = refill
                .into_iter()
                .map(|c| c.id)
                .filter(|id| !ids.contains(id))
                .take(missing)
                .collect();
            ids.extend(extra);
        }

        self.move_found(
            ids,
            quantity,
            CylinderMove::to_customer(customer_name, holder),
            format!("EMPTY {} cylinders to send back to {}", cylinder_type, customer_name),
        )
        .await
    }

    /// Brings cylinders held by a customer back to the store as FULL
    pub async fn restock_from_holder(
        &mut self,
        holder: CylinderHolder,
        cylinder_type: CylinderType,
        quantity: u32,
    ) -> Result<u32, LedgerError> {
        let ids = self
            .held_by(holder, cylinder_type, quantity)
            .await?;
        self.move_found(
            ids,
            quantity,
            CylinderMove::to_store_full(),
            format!("{} cylinders held by customer", cylinder_type),
        )
        .await
    }

    /// Brings back to the store whatever FULL cylinders of a voided sale the customer still holds
    ///
    /// B2B sales hand out no tracked cylinders, so finding fewer than
    /// `quantity` is expected and not reported as a shortfall.
    pub async fn recall_from_holder(
        &mut self,
        holder: CylinderHolder,
        cylinder_type: CylinderType,
        quantity: u32,
    ) -> Result<u32, LedgerError> {
        let ids = self.held_by(holder, cylinder_type, quantity).await?;
        let found = ids.len() as u32;
        if !ids.is_empty() {
            self.uow.move_cylinders(&ids, &CylinderMove::to_store_full(), self.at).await?;
        }
        debug!(
            bill_sno = %self.bill_sno,
            cylinder_type = %cylinder_type,
            recalled = found,
            quantity,
            "Recalled held cylinders"
        );
        Ok(found)
    }

    /// Receives cylinders held by a customer back as EMPTY
    pub async fn collect_from_holder(
        &mut self,
        holder: CylinderHolder,
        cylinder_type: CylinderType,
        quantity: u32,
        source: TransactionRef,
    ) -> Result<u32, LedgerError> {
        let ids = self.held_by(holder, cylinder_type, quantity).await?;
        self.move_found(
            ids,
            quantity,
            CylinderMove::returned_empty(source),
            format!("{} cylinders held by customer", cylinder_type),
        )
        .await
    }

    /// Hands FULL store cylinders to a customer
    pub async fn issue_to_holder(
        &mut self,
        holder: CylinderHolder,
        customer_name: &str,
        cylinder_type: CylinderType,
        quantity: u32,
    ) -> Result<u32, LedgerError> {
        let ids = self
            .uow
            .find_cylinders(
                &CylinderQuery::of(cylinder_type, CylinderStatus::Full)
                    .at(CylinderLocation::StoreReadyForSale)
                    .limit(quantity as usize),
            )
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        self.move_found(
            ids,
            quantity,
            CylinderMove::to_customer(customer_name, holder),
            format!("FULL {} cylinders in store", cylinder_type),
        )
        .await
    }

    async fn held_by(
        &mut self,
        holder: CylinderHolder,
        cylinder_type: CylinderType,
        quantity: u32,
    ) -> Result<Vec<CylinderId>, LedgerError> {
        Ok(self
            .uow
            .find_cylinders(
                &CylinderQuery::of(cylinder_type, CylinderStatus::WithCustomer)
                    .held_by(holder)
                    .limit(quantity as usize),
            )
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }

    async fn move_found(
        &mut self,
        ids: Vec<CylinderId>,
        expected: u32,
        movement: CylinderMove,
        subject: String,
    ) -> Result<u32, LedgerError> {
        let found = ids.len() as u32;
        if !ids.is_empty() {
            self.uow.move_cylinders(&ids, &movement, self.at).await?;
        }
        if found < expected {
            self.shortfall(subject, expected, found);
        }
        Ok(found)
    }

    fn shortfall(&mut self, subject: String, expected: u32, found: u32) {
        let warning = ReconciliationWarning {
            bill_sno: self.bill_sno.clone(),
            subject,
            expected,
            found,
        };
        warn!(
            bill_sno = %warning.bill_sno,
            expected = warning.expected,
            found = warning.found,
            "Inventory shortfall: {}", warning.subject
        );
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cylinder::Cylinder;
    use crate::ports::mock::MockLedgerStore;
    use crate::ports::LedgerStore;
    use crate::product::Product;
    use core_kernel::{Currency, CustomerId, Money, TransactionId};
    use rust_decimal_macros::dec;

    fn cylinder(cylinder_type: CylinderType, status: CylinderStatus, location: CylinderLocation, holder: Option<CylinderHolder>) -> Cylinder {
        NewCylinder {
            code: "CYL".into(),
            cylinder_type,
            status,
            location,
            holder,
            source_transaction: None,
        }
        .into_cylinder(Utc::now())
    }

    fn product(name: &str, stock: i64) -> Product {
        Product {
            id: ProductId::new(),
            name: name.into(),
            category: Some("Accessories".into()),
            stock_quantity: stock,
            unit_price: Money::new(dec!(1500), Currency::PKR),
            cost_price: Money::new(dec!(1100), Currency::PKR),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_deduct_by_name_and_insufficient_stock() {
        let store = MockLedgerStore::new();
        let regulator = product("Regulator", 1);
        store.insert_product(regulator.clone()).await;

        let mut uow = store.begin().await.unwrap();
        let mut adjuster = InventoryAdjuster::new(uow.as_mut(), "BILL-202403010001", Utc::now());
        let resolved = adjuster.deduct_product(None, "regulator", 1).await.unwrap();
        assert_eq!(resolved, Some(regulator.id));

        let result = adjuster.deduct_product(None, "Regulator", 1).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));

        let untracked = adjuster.deduct_product(None, "Gas pipe", 3).await.unwrap();
        assert!(untracked.is_none());
    }

    #[tokio::test]
    async fn test_restock_reports_shortfall() {
        let store = MockLedgerStore::new();
        let owner = CylinderHolder::B2b(CustomerId::new());
        store
            .insert_cylinder(cylinder(
                CylinderType::Domestic11_8Kg,
                CylinderStatus::WithCustomer,
                CylinderLocation::customer("Ali Traders"),
                Some(owner),
            ))
            .await;

        let mut uow = store.begin().await.unwrap();
        let mut adjuster = InventoryAdjuster::new(uow.as_mut(), "BILL-1", Utc::now());
        let moved = adjuster
            .restock_from_holder(owner, CylinderType::Domestic11_8Kg, 3)
            .await
            .unwrap();
        assert_eq!(moved, 1);
        let warnings = adjuster.into_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!((warnings[0].expected, warnings[0].found), (3, 1));
        uow.commit().await.unwrap();

        let cylinders = store.cylinders().await;
        assert_eq!(cylinders[0].status, CylinderStatus::Full);
        assert_eq!(cylinders[0].location, CylinderLocation::StoreReadyForSale);
        assert!(cylinders[0].holder.is_none());
    }

    #[tokio::test]
    async fn test_recall_moves_held_cylinders_without_shortfall() {
        let store = MockLedgerStore::new();
        let owner = CylinderHolder::B2b(CustomerId::new());
        store
            .insert_cylinder(cylinder(
                CylinderType::Domestic11_8Kg,
                CylinderStatus::WithCustomer,
                CylinderLocation::customer("Ali Traders"),
                Some(owner),
            ))
            .await;

        let mut uow = store.begin().await.unwrap();
        let mut adjuster = InventoryAdjuster::new(uow.as_mut(), "BILL-1", Utc::now());
        let recalled = adjuster
            .recall_from_holder(owner, CylinderType::Domestic11_8Kg, 2)
            .await
            .unwrap();
        assert_eq!(recalled, 1);
        assert!(adjuster.warnings().is_empty());
        uow.commit().await.unwrap();

        let cylinders = store.cylinders().await;
        assert_eq!(cylinders[0].status, CylinderStatus::Full);
        assert_eq!(cylinders[0].location, CylinderLocation::StoreReadyForSale);
    }

    #[tokio::test]
    async fn test_reissue_prefers_cylinders_from_same_transaction() {
        let store = MockLedgerStore::new();
        let source = TransactionRef::B2b(TransactionId::new());
        // A refill-ready empty that must not be picked while the returned one exists
        store
            .insert_cylinder(cylinder(
                CylinderType::Standard15Kg,
                CylinderStatus::Empty,
                CylinderLocation::StoreReadyForRefill,
                None,
            ))
            .await;

        let mut uow = store.begin().await.unwrap();
        let mut adjuster = InventoryAdjuster::new(uow.as_mut(), "BILL-1", Utc::now());
        let created = adjuster
            .receive_returned(source, CylinderType::Standard15Kg, 1)
            .await
            .unwrap();
        let holder = CylinderHolder::B2b(CustomerId::new());
        adjuster
            .reissue_returned(source, CylinderType::Standard15Kg, 1, holder, "Ali Traders")
            .await
            .unwrap();
        assert!(adjuster.warnings().is_empty());
        uow.commit().await.unwrap();

        let cylinders = store.cylinders().await;
        let reissued = cylinders.iter().find(|c| c.id == created[0]).unwrap();
        assert_eq!(reissued.status, CylinderStatus::WithCustomer);
        assert_eq!(reissued.holder, Some(holder));
        assert_eq!(cylinders[0].status, CylinderStatus::Empty);
    }
}
