//! Test Data Builders
//!
//! Builders with sensible defaults so that tests only spell out the fields
//! they care about. Names and phone numbers are generated with `fake`.

use chrono::{NaiveDate, Utc};
use fake::faker::address::en::StreetName;
use fake::faker::company::en::CompanyName;
use fake::faker::name::en::{Name, FirstName};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{
    CustomItemId, CustomerId, HoldingId, Money, ProductId, RetailCustomerId, RetailTransactionId,
};
use domain_ledger::retail::{CylinderHolding, RetailCustomer};
use domain_ledger::{
    CustomItem, Customer, Cylinder, CylinderHolder, CylinderLocation, CylinderStatus, CylinderType,
    DueCounters, NewCylinder, Product, TransactionRef,
};

use crate::fixtures::{pkr, DateFixtures};

/// Builder for B2B customers
pub struct CustomerBuilder {
    customer: Customer,
}

impl Default for CustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            customer: Customer {
                id: CustomerId::new_v7(),
                name: CompanyName().fake(),
                contact_person: Some(Name().fake()),
                phone: Some(PhoneNumber().fake()),
                email: None,
                address: Some(StreetName().fake()),
                credit_limit: pkr(dec!(100000)),
                payment_terms_days: 30,
                ledger_balance: pkr(dec!(0)),
                dues: DueCounters::default(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: CustomerId) -> Self {
        self.customer.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.customer.name = name.into();
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.customer.ledger_balance = pkr(balance);
        self
    }

    pub fn with_due(mut self, cylinder_type: CylinderType, count: u32) -> Self {
        match cylinder_type {
            CylinderType::Domestic11_8Kg => self.customer.dues.domestic_11_8kg = count,
            CylinderType::Standard15Kg => self.customer.dues.standard_15kg = count,
            CylinderType::Commercial45_4Kg => self.customer.dues.commercial_45_4kg = count,
        }
        self
    }

    pub fn build(self) -> Customer {
        self.customer
    }
}

/// Builder for cylinders, defaulting to a full domestic cylinder in store
pub struct CylinderBuilder {
    new: NewCylinder,
}

impl Default for CylinderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CylinderBuilder {
    pub fn new() -> Self {
        Self {
            new: NewCylinder {
                code: format!("CYL-{}", uuid::Uuid::new_v4().simple()),
                cylinder_type: CylinderType::Domestic11_8Kg,
                status: CylinderStatus::Full,
                location: CylinderLocation::StoreReadyForSale,
                holder: None,
                source_transaction: None,
            },
        }
    }

    pub fn of_type(mut self, cylinder_type: CylinderType) -> Self {
        self.new.cylinder_type = cylinder_type;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.new.code = code.into();
        self
    }

    pub fn with_status(mut self, status: CylinderStatus) -> Self {
        self.new.status = status;
        self
    }

    pub fn at(mut self, location: CylinderLocation) -> Self {
        self.new.location = location;
        self
    }

    /// Places the cylinder with a customer
    pub fn held_by(mut self, holder: CylinderHolder, name: &str) -> Self {
        self.new.status = CylinderStatus::WithCustomer;
        self.new.location = CylinderLocation::customer(name);
        self.new.holder = Some(holder);
        self
    }

    pub fn from_transaction(mut self, source: TransactionRef) -> Self {
        self.new.source_transaction = Some(source);
        self
    }

    pub fn build(self) -> Cylinder {
        self.new.into_cylinder(Utc::now())
    }
}

/// Builder for catalogue products
pub struct ProductBuilder {
    product: Product,
}

impl Default for ProductBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductBuilder {
    pub fn new() -> Self {
        Self {
            product: Product {
                id: ProductId::new_v7(),
                name: "Regulator".to_string(),
                category: Some("Accessories".to_string()),
                stock_quantity: 10,
                unit_price: pkr(dec!(1500)),
                cost_price: pkr(dec!(1100)),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.product.name = name.into();
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.product.stock_quantity = stock;
        self
    }

    pub fn priced(mut self, unit_price: Decimal, cost_price: Decimal) -> Self {
        self.product.unit_price = pkr(unit_price);
        self.product.cost_price = pkr(cost_price);
        self
    }

    pub fn build(self) -> Product {
        self.product
    }
}

/// Builder for retail custom items
pub struct CustomItemBuilder {
    item: CustomItem,
}

impl Default for CustomItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomItemBuilder {
    pub fn new() -> Self {
        Self {
            item: CustomItem {
                id: CustomItemId::new_v7(),
                name: "Gas Pipe".to_string(),
                item_type: "Accessory".to_string(),
                quantity: 10,
                cost_price: pkr(dec!(250)),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn named(mut self, name: impl Into<String>, item_type: impl Into<String>) -> Self {
        self.item.name = name.into();
        self.item.item_type = item_type.into();
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.item.quantity = quantity;
        self
    }

    pub fn build(self) -> CustomItem {
        self.item
    }
}

/// Builder for walk-in customers
pub struct RetailCustomerBuilder {
    customer: RetailCustomer,
}

impl Default for RetailCustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetailCustomerBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            customer: RetailCustomer {
                id: RetailCustomerId::new_v7(),
                name: FirstName().fake(),
                phone: Some(PhoneNumber().fake()),
                address: None,
                total_profit: pkr(dec!(0)),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.customer.name = name.into();
        self
    }

    pub fn with_profit(mut self, profit: Decimal) -> Self {
        self.customer.total_profit = pkr(profit);
        self
    }

    pub fn build(self) -> RetailCustomer {
        self.customer
    }
}

/// Builder for open deposit holdings
pub struct HoldingBuilder {
    holding: CylinderHolding,
}

impl HoldingBuilder {
    pub fn new(customer_id: RetailCustomerId) -> Self {
        Self {
            holding: CylinderHolding {
                id: HoldingId::new_v7(),
                customer_id,
                cylinder_type: CylinderType::Domestic11_8Kg,
                quantity: 1,
                security_amount: pkr(dec!(3000)),
                issue_date: DateFixtures::bill_date(),
                is_returned: false,
                return_date: None,
                return_deduction: None,
                issued_by_transaction: RetailTransactionId::new_v7(),
                returned_by_transaction: None,
            },
        }
    }

    pub fn of(mut self, cylinder_type: CylinderType, quantity: u32) -> Self {
        self.holding.cylinder_type = cylinder_type;
        self.holding.quantity = quantity;
        self
    }

    pub fn issued_on(mut self, date: NaiveDate) -> Self {
        self.holding.issue_date = date;
        self
    }

    pub fn with_security(mut self, amount: Money) -> Self {
        self.holding.security_amount = amount;
        self
    }

    pub fn issued_by(mut self, transaction_id: RetailTransactionId) -> Self {
        self.holding.issued_by_transaction = transaction_id;
        self
    }

    pub fn build(self) -> CylinderHolding {
        self.holding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_builder_defaults() {
        let customer = CustomerBuilder::new()
            .with_due(CylinderType::Standard15Kg, 3)
            .build();
        assert!(!customer.name.is_empty());
        assert!(customer.ledger_balance.is_zero());
        assert_eq!(customer.dues.standard_15kg, 3);
    }

    #[test]
    fn test_cylinder_builder_with_holder() {
        let customer_id = CustomerId::new();
        let cylinder = CylinderBuilder::new()
            .of_type(CylinderType::Commercial45_4Kg)
            .held_by(CylinderHolder::B2b(customer_id), "Hotel One")
            .build();
        assert_eq!(cylinder.status, CylinderStatus::WithCustomer);
        assert_eq!(cylinder.capacity_kg, dec!(45.4));
        assert_eq!(cylinder.location.to_string(), "Customer: Hotel One");
    }
}
