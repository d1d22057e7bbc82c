//! B2B ledger transactions
//!
//! A transaction is immutable once recorded except for its void marker. Along
//! with the priced line items it stores the balance and due-counter effects
//! that were actually applied to the customer, so a reversal can negate them
//! exactly instead of recomputing them from the current state.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ActorId, CustomerId, Money, ProductId, TransactionId, TransactionItemId};

use crate::customer::DueDelta;
use crate::cylinder::CylinderType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Sale,
    Payment,
    Buyback,
    ReturnEmpty,
    Adjustment,
    CreditNote,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "SALE",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Buyback => "BUYBACK",
            TransactionType::ReturnEmpty => "RETURN_EMPTY",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::CreditNote => "CREDIT_NOTE",
        }
    }

    /// Whether a line of the given category may appear on this type
    pub fn permits(&self, category: ItemCategory) -> bool {
        use ItemCategory::*;
        match self {
            TransactionType::Sale => matches!(category, Cylinder | EmptyReturn | Accessory | Charge),
            TransactionType::Payment => matches!(category, Payment),
            TransactionType::Buyback => matches!(category, Buyback),
            TransactionType::ReturnEmpty => matches!(category, EmptyReturn),
            TransactionType::Adjustment | TransactionType::CreditNote => {
                matches!(category, Charge | Payment)
            }
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SALE" => Ok(TransactionType::Sale),
            "PAYMENT" => Ok(TransactionType::Payment),
            "BUYBACK" => Ok(TransactionType::Buyback),
            "RETURN_EMPTY" => Ok(TransactionType::ReturnEmpty),
            "ADJUSTMENT" => Ok(TransactionType::Adjustment),
            "CREDIT_NOTE" => Ok(TransactionType::CreditNote),
            other => Err(format!("Unknown transaction type: {}", other)),
        }
    }
}

/// Line item categories, independent of their payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Cylinder,
    EmptyReturn,
    Buyback,
    Accessory,
    Payment,
    Charge,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Cylinder => "cylinder",
            ItemCategory::EmptyReturn => "empty_return",
            ItemCategory::Buyback => "buyback",
            ItemCategory::Accessory => "accessory",
            ItemCategory::Payment => "payment",
            ItemCategory::Charge => "charge",
        }
    }
}

/// Pricing record of a bought-back cylinder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuybackDetails {
    pub returned_condition: String,
    pub remaining_kg: Decimal,
    pub original_sold_price: Money,
    pub buyback_rate: Decimal,
    pub buyback_price_per_item: Money,
    pub buyback_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Cylinder { cylinder_type: CylinderType },
    EmptyReturn { cylinder_type: CylinderType },
    Buyback { cylinder_type: CylinderType, details: BuybackDetails },
    Accessory { product_id: Option<ProductId>, name: String },
    Payment,
    Charge { description: String },
}

impl ItemKind {
    pub fn category(&self) -> ItemCategory {
        match self {
            ItemKind::Cylinder { .. } => ItemCategory::Cylinder,
            ItemKind::EmptyReturn { .. } => ItemCategory::EmptyReturn,
            ItemKind::Buyback { .. } => ItemCategory::Buyback,
            ItemKind::Accessory { .. } => ItemCategory::Accessory,
            ItemKind::Payment => ItemCategory::Payment,
            ItemKind::Charge { .. } => ItemCategory::Charge,
        }
    }

    pub fn cylinder_type(&self) -> Option<CylinderType> {
        match self {
            ItemKind::Cylinder { cylinder_type }
            | ItemKind::EmptyReturn { cylinder_type }
            | ItemKind::Buyback { cylinder_type, .. } => Some(*cylinder_type),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub id: TransactionItemId,
    pub kind: ItemKind,
    pub quantity: u32,
    pub price_per_item: Money,
    pub total_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidRecord {
    pub voided_by: ActorId,
    pub voided_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub bill_sno: String,
    pub transaction_type: TransactionType,
    pub customer_id: CustomerId,
    pub transaction_at: DateTime<Utc>,
    pub bill_date: NaiveDate,
    pub total_amount: Money,
    /// Set when part of a sale was paid at the counter
    pub unpaid_amount: Option<Money>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub balance_effect: Money,
    pub due_effect: DueDelta,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub void: Option<VoidRecord>,
    pub items: Vec<TransactionItem>,
}

impl LedgerTransaction {
    pub fn is_voided(&self) -> bool {
        self.void.is_some()
    }

    /// Units per cylinder type across lines of one category
    pub fn cylinder_quantities(&self, category: ItemCategory) -> Vec<(CylinderType, u32)> {
        let mut totals: Vec<(CylinderType, u32)> = Vec::new();
        for item in self.items.iter().filter(|i| i.kind.category() == category) {
            if let Some(cylinder_type) = item.kind.cylinder_type() {
                match totals.iter_mut().find(|(t, _)| *t == cylinder_type) {
                    Some((_, quantity)) => *quantity += item.quantity,
                    None => totals.push((cylinder_type, item.quantity)),
                }
            }
        }
        totals
    }
}

/// What a line item is, as submitted by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewItemKind {
    Cylinder { cylinder_type: CylinderType },
    EmptyReturn { cylinder_type: CylinderType },
    Buyback {
        cylinder_type: CylinderType,
        returned_condition: String,
        remaining_kg: Decimal,
        original_sold_price: Money,
    },
    Accessory { product_id: Option<ProductId>, name: String },
    Payment,
    Charge { description: String },
}

impl NewItemKind {
    pub fn category(&self) -> ItemCategory {
        match self {
            NewItemKind::Cylinder { .. } => ItemCategory::Cylinder,
            NewItemKind::EmptyReturn { .. } => ItemCategory::EmptyReturn,
            NewItemKind::Buyback { .. } => ItemCategory::Buyback,
            NewItemKind::Accessory { .. } => ItemCategory::Accessory,
            NewItemKind::Payment => ItemCategory::Payment,
            NewItemKind::Charge { .. } => ItemCategory::Charge,
        }
    }
}

/// An unpriced line item
///
/// `quantity` is signed so that malformed input reaches validation instead of
/// failing deserialization. Buyback lines ignore `price_per_item`; their price
/// is derived from the remaining gas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub kind: NewItemKind,
    pub quantity: i64,
    pub price_per_item: Money,
}

impl NewLineItem {
    pub fn new(kind: NewItemKind, quantity: i64, price_per_item: Money) -> Self {
        Self {
            kind,
            quantity,
            price_per_item,
        }
    }
}

/// Input of the transaction recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub transaction_type: TransactionType,
    pub customer_id: CustomerId,
    /// Business date, `YYYY-MM-DD`
    pub date: String,
    pub time: Option<String>,
    pub items: Vec<NewLineItem>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    /// Amount settled at the counter; SALE only
    pub amount_paid: Option<Money>,
}

impl RecordTransaction {
    pub fn new(transaction_type: TransactionType, customer_id: CustomerId, date: impl Into<String>) -> Self {
        Self {
            transaction_type,
            customer_id,
            date: date.into(),
            time: None,
            items: Vec::new(),
            payment_reference: None,
            notes: None,
            amount_paid: None,
        }
    }

    /// A payment received, carried as a single synthetic "Payment" line
    pub fn payment(customer_id: CustomerId, amount: Money, date: impl Into<String>) -> Self {
        Self::new(TransactionType::Payment, customer_id, date)
            .with_item(NewLineItem::new(NewItemKind::Payment, 1, amount))
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_item(mut self, item: NewLineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_amount_paid(mut self, amount: Money) -> Self {
        self.amount_paid = Some(amount);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kinds_allowed_per_type() {
        assert!(TransactionType::Sale.permits(ItemCategory::Accessory));
        assert!(TransactionType::Sale.permits(ItemCategory::EmptyReturn));
        assert!(!TransactionType::Sale.permits(ItemCategory::Payment));
        assert!(TransactionType::Payment.permits(ItemCategory::Payment));
        assert!(!TransactionType::Payment.permits(ItemCategory::Cylinder));
        assert!(TransactionType::ReturnEmpty.permits(ItemCategory::EmptyReturn));
        assert!(!TransactionType::ReturnEmpty.permits(ItemCategory::Buyback));
        assert!(TransactionType::CreditNote.permits(ItemCategory::Charge));
    }

    #[test]
    fn test_type_wire_names() {
        for t in [
            TransactionType::Sale,
            TransactionType::Payment,
            TransactionType::Buyback,
            TransactionType::ReturnEmpty,
            TransactionType::Adjustment,
            TransactionType::CreditNote,
        ] {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t.as_str()));
        }
    }
}
