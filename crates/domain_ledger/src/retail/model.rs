//! B2C (retail) data model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ActorId, HoldingId, Money, RetailCustomerId, RetailItemId, RetailTransactionId};

use crate::cylinder::CylinderType;
use crate::product::StockSource;
use crate::transaction::{TransactionType, VoidRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetailCustomer {
    pub id: RetailCustomerId,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Lifetime profit earned from this customer, never below zero
    pub total_profit: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cylinders a retail customer holds against a security deposit
///
/// A holding is created by a deposit and marked returned when the
/// cylinders come back. Partial returns split the holding so that each row
/// is either entirely open or entirely returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CylinderHolding {
    pub id: HoldingId,
    pub customer_id: RetailCustomerId,
    pub cylinder_type: CylinderType,
    pub quantity: u32,
    /// Deposit per cylinder
    pub security_amount: Money,
    pub issue_date: NaiveDate,
    pub is_returned: bool,
    pub return_date: Option<NaiveDate>,
    pub return_deduction: Option<Money>,
    pub issued_by_transaction: RetailTransactionId,
    pub returned_by_transaction: Option<RetailTransactionId>,
}

impl CylinderHolding {
    pub fn mark_returned(&mut self, date: NaiveDate, deduction_per_item: Money, by: RetailTransactionId) {
        self.is_returned = true;
        self.return_date = Some(date);
        self.return_deduction = Some(deduction_per_item.multiply(self.quantity.into()));
        self.returned_by_transaction = Some(by);
    }

    pub fn unmark_returned(&mut self) {
        self.is_returned = false;
        self.return_date = None;
        self.return_deduction = None;
        self.returned_by_transaction = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CASH" => Ok(PaymentMethod::Cash),
            "CARD" => Ok(PaymentMethod::Card),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "CREDIT" => Ok(PaymentMethod::Credit),
            other => Err(format!("Unknown payment method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasItem {
    pub id: RetailItemId,
    pub cylinder_type: CylinderType,
    pub quantity: u32,
    pub price_per_item: Money,
    pub cost_per_item: Money,
    pub total_price: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum SecurityDirection {
    Deposit,
    Return { deduction_per_item: Money },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityItem {
    pub id: RetailItemId,
    pub cylinder_type: CylinderType,
    pub quantity: u32,
    pub price_per_item: Money,
    pub direction: SecurityDirection,
    /// Positive for deposits, negative for refunds
    pub total_price: Money,
}

impl SecurityItem {
    pub fn is_return(&self) -> bool {
        matches!(self.direction, SecurityDirection::Return { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryItem {
    pub id: RetailItemId,
    pub name: String,
    pub item_type: String,
    pub quantity: u32,
    pub price_per_item: Money,
    pub cost_per_item: Money,
    pub total_price: Money,
    pub stock_source: StockSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetailTransaction {
    pub id: RetailTransactionId,
    pub bill_sno: String,
    pub transaction_type: TransactionType,
    pub customer_id: RetailCustomerId,
    pub transaction_at: DateTime<Utc>,
    pub bill_date: NaiveDate,
    pub gas_items: Vec<GasItem>,
    pub security_items: Vec<SecurityItem>,
    pub accessory_items: Vec<AccessoryItem>,
    pub total_amount: Money,
    pub delivery_charges: Money,
    pub final_amount: Money,
    pub actual_profit: Money,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub void: Option<VoidRecord>,
}

impl RetailTransaction {
    pub fn is_voided(&self) -> bool {
        self.void.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGasItem {
    pub cylinder_type: CylinderType,
    pub quantity: i64,
    pub price_per_item: Money,
    pub cost_per_item: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSecurityItem {
    pub cylinder_type: CylinderType,
    pub quantity: i64,
    pub price_per_item: Money,
    pub direction: SecurityDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccessoryItem {
    pub name: String,
    pub item_type: String,
    pub quantity: i64,
    pub price_per_item: Money,
    pub cost_per_item: Money,
}

/// Input of the retail transaction recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRetailTransaction {
    pub customer_id: RetailCustomerId,
    pub date: String,
    pub time: Option<String>,
    pub gas_items: Vec<NewGasItem>,
    pub security_items: Vec<NewSecurityItem>,
    pub accessory_items: Vec<NewAccessoryItem>,
    pub delivery_charges: Option<Money>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl RecordRetailTransaction {
    pub fn new(customer_id: RetailCustomerId, date: impl Into<String>) -> Self {
        Self {
            customer_id,
            date: date.into(),
            time: None,
            gas_items: Vec::new(),
            security_items: Vec::new(),
            accessory_items: Vec::new(),
            delivery_charges: None,
            payment_method: PaymentMethod::Cash,
            notes: None,
        }
    }

    pub fn with_gas(mut self, item: NewGasItem) -> Self {
        self.gas_items.push(item);
        self
    }

    pub fn with_security(mut self, item: NewSecurityItem) -> Self {
        self.security_items.push(item);
        self
    }

    pub fn with_accessory(mut self, item: NewAccessoryItem) -> Self {
        self.accessory_items.push(item);
        self
    }

    pub fn with_delivery(mut self, charges: Money) -> Self {
        self.delivery_charges = Some(charges);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.gas_items.is_empty() && self.security_items.is_empty() && self.accessory_items.is_empty()
    }

    /// RETURN_EMPTY when the transaction only refunds deposits, SALE otherwise
    pub fn derived_type(&self) -> TransactionType {
        let only_returns = self.gas_items.is_empty()
            && self.accessory_items.is_empty()
            && !self.security_items.is_empty()
            && self
                .security_items
                .iter()
                .all(|s| matches!(s.direction, SecurityDirection::Return { .. }));
        if only_returns {
            TransactionType::ReturnEmpty
        } else {
            TransactionType::Sale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn pkr(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::PKR)
    }

    #[test]
    fn test_derived_type() {
        let customer = RetailCustomerId::new();
        let returning = RecordRetailTransaction::new(customer, "2024-03-01").with_security(NewSecurityItem {
            cylinder_type: CylinderType::Domestic11_8Kg,
            quantity: 1,
            price_per_item: pkr(dec!(2000)),
            direction: SecurityDirection::Return { deduction_per_item: pkr(dec!(100)) },
        });
        assert_eq!(returning.derived_type(), TransactionType::ReturnEmpty);

        let selling = returning.with_gas(NewGasItem {
            cylinder_type: CylinderType::Domestic11_8Kg,
            quantity: 1,
            price_per_item: pkr(dec!(3000)),
            cost_per_item: pkr(dec!(2600)),
        });
        assert_eq!(selling.derived_type(), TransactionType::Sale);
    }

    #[test]
    fn test_holding_return_marking() {
        let mut holding = CylinderHolding {
            id: HoldingId::new(),
            customer_id: RetailCustomerId::new(),
            cylinder_type: CylinderType::Domestic11_8Kg,
            quantity: 2,
            security_amount: pkr(dec!(2000)),
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            is_returned: false,
            return_date: None,
            return_deduction: None,
            issued_by_transaction: RetailTransactionId::new(),
            returned_by_transaction: None,
        };
        let by = RetailTransactionId::new();
        holding.mark_returned(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), pkr(dec!(150)), by);
        assert_eq!(holding.return_deduction, Some(pkr(dec!(300))));
        assert_eq!(holding.returned_by_transaction, Some(by));

        holding.unmark_returned();
        assert!(!holding.is_returned);
        assert!(holding.return_date.is_none());
    }
}
