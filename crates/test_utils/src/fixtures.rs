//! Pre-built Test Fixtures
//!
//! Money helpers, canned line items and `TestLedger`, an in-memory ledger
//! with a service wired to a `MockLedgerStore`.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ActorId, Currency, Money, ProductId};
use domain_ledger::ports::mock::MockLedgerStore;
use domain_ledger::retail::{NewAccessoryItem, NewGasItem, NewSecurityItem, RetailCustomer, SecurityDirection};
use domain_ledger::{
    CustomItem, Customer, Cylinder, CylinderType, LedgerConfig, LedgerService, NewItemKind,
    NewLineItem, Product,
};

use crate::builders::{
    CustomItemBuilder, CustomerBuilder, CylinderBuilder, ProductBuilder, RetailCustomerBuilder,
};

/// An amount in Pakistani rupees, the default ledger currency
pub fn pkr(amount: Decimal) -> Money {
    Money::new(amount, Currency::PKR)
}

/// Fixture for dates
pub struct DateFixtures;

impl DateFixtures {
    /// Business day used by most tests
    pub fn bill_day() -> &'static str {
        "2024-03-01"
    }

    pub fn bill_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid fixture date")
    }

    pub fn next_day() -> &'static str {
        "2024-03-02"
    }
}

/// Fixture for B2B line items
pub struct LineFixtures;

impl LineFixtures {
    pub fn cylinders(cylinder_type: CylinderType, quantity: i64, price: Decimal) -> NewLineItem {
        NewLineItem::new(NewItemKind::Cylinder { cylinder_type }, quantity, pkr(price))
    }

    /// Two domestic cylinders at 5000 each
    pub fn two_domestic() -> NewLineItem {
        Self::cylinders(CylinderType::Domestic11_8Kg, 2, dec!(5000))
    }

    pub fn empty_return(cylinder_type: CylinderType, quantity: i64) -> NewLineItem {
        NewLineItem::new(NewItemKind::EmptyReturn { cylinder_type }, quantity, pkr(dec!(0)))
    }

    pub fn buyback(
        cylinder_type: CylinderType,
        quantity: i64,
        remaining_kg: Decimal,
        original_sold_price: Decimal,
    ) -> NewLineItem {
        NewLineItem::new(
            NewItemKind::Buyback {
                cylinder_type,
                returned_condition: "Partially used".to_string(),
                remaining_kg,
                original_sold_price: pkr(original_sold_price),
            },
            quantity,
            pkr(dec!(0)),
        )
    }

    pub fn accessory(product_id: Option<ProductId>, name: &str, quantity: i64, price: Decimal) -> NewLineItem {
        NewLineItem::new(
            NewItemKind::Accessory {
                product_id,
                name: name.to_string(),
            },
            quantity,
            pkr(price),
        )
    }

    pub fn payment(amount: Decimal) -> NewLineItem {
        NewLineItem::new(NewItemKind::Payment, 1, pkr(amount))
    }

    pub fn charge(description: &str, amount: Decimal) -> NewLineItem {
        NewLineItem::new(
            NewItemKind::Charge {
                description: description.to_string(),
            },
            1,
            pkr(amount),
        )
    }
}

/// Fixture for B2C line items
pub struct RetailFixtures;

impl RetailFixtures {
    pub fn gas(cylinder_type: CylinderType, quantity: i64, price: Decimal, cost: Decimal) -> NewGasItem {
        NewGasItem {
            cylinder_type,
            quantity,
            price_per_item: pkr(price),
            cost_per_item: pkr(cost),
        }
    }

    pub fn deposit(cylinder_type: CylinderType, quantity: i64, security: Decimal) -> NewSecurityItem {
        NewSecurityItem {
            cylinder_type,
            quantity,
            price_per_item: pkr(security),
            direction: SecurityDirection::Deposit,
        }
    }

    pub fn refund(
        cylinder_type: CylinderType,
        quantity: i64,
        security: Decimal,
        deduction_per_item: Decimal,
    ) -> NewSecurityItem {
        NewSecurityItem {
            cylinder_type,
            quantity,
            price_per_item: pkr(security),
            direction: SecurityDirection::Return {
                deduction_per_item: pkr(deduction_per_item),
            },
        }
    }

    pub fn accessory(name: &str, item_type: &str, quantity: i64, price: Decimal, cost: Decimal) -> NewAccessoryItem {
        NewAccessoryItem {
            name: name.to_string(),
            item_type: item_type.to_string(),
            quantity,
            price_per_item: pkr(price),
            cost_per_item: pkr(cost),
        }
    }
}

/// An in-memory ledger for service-level tests
pub struct TestLedger {
    pub store: MockLedgerStore,
    pub service: Arc<LedgerService>,
    pub actor: ActorId,
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let store = MockLedgerStore::new();
        let service = Arc::new(LedgerService::new(Arc::new(store.clone()), config));
        Self {
            store,
            service,
            actor: ActorId::new("counter@lpg"),
        }
    }

    pub async fn seed_customer(&self) -> Customer {
        self.add_customer(CustomerBuilder::new().build()).await
    }

    pub async fn add_customer(&self, customer: Customer) -> Customer {
        self.store.insert_customer(customer.clone()).await;
        customer
    }

    pub async fn seed_product(&self, name: &str, stock: i64) -> Product {
        let product = ProductBuilder::new().named(name).with_stock(stock).build();
        self.store.insert_product(product.clone()).await;
        product
    }

    pub async fn seed_custom_item(&self, name: &str, item_type: &str, quantity: i64) -> CustomItem {
        let item = CustomItemBuilder::new()
            .named(name, item_type)
            .with_quantity(quantity)
            .build();
        self.store.insert_custom_item(item.clone()).await;
        item
    }

    pub async fn seed_retail_customer(&self) -> RetailCustomer {
        let customer = RetailCustomerBuilder::new().build();
        self.store.insert_retail_customer(customer.clone()).await;
        customer
    }

    /// Adds FULL cylinders at "Store - Ready for Sale"
    pub async fn seed_full_cylinders(&self, cylinder_type: CylinderType, count: usize) -> Vec<Cylinder> {
        let mut seeded = Vec::with_capacity(count);
        for _ in 0..count {
            let cylinder = CylinderBuilder::new().of_type(cylinder_type).build();
            self.store.insert_cylinder(cylinder.clone()).await;
            seeded.push(cylinder);
        }
        seeded
    }

    pub async fn add_cylinder(&self, cylinder: Cylinder) -> Cylinder {
        self.store.insert_cylinder(cylinder.clone()).await;
        cylinder
    }
}
