//! B2B transaction DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Currency, CustomerId, Money, ProductId};
use domain_ledger::{
    CylinderType, ItemCategory, ItemKind, LedgerTransaction, NewItemKind, NewLineItem,
    RecordTransaction, ReconciliationWarning, TransactionItem, TransactionType,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    pub transaction_type: TransactionType,
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "date is required"))]
    pub date: String,
    pub time: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<LineItemRequest>,
    #[validate(length(max = 100))]
    pub payment_reference: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub amount_paid: Option<Decimal>,
}

/// One line of a B2B bill
///
/// ```json
/// {"kind": "cylinder", "cylinder_type": "DOMESTIC_11_8KG", "quantity": 2, "price_per_item": "5000"}
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct LineItemRequest {
    #[serde(flatten)]
    pub kind: LineKindRequest,
    pub quantity: i64,
    #[serde(default)]
    pub price_per_item: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineKindRequest {
    Cylinder {
        cylinder_type: CylinderType,
    },
    EmptyReturn {
        cylinder_type: CylinderType,
    },
    Buyback {
        cylinder_type: CylinderType,
        returned_condition: String,
        remaining_kg: Decimal,
        original_sold_price: Decimal,
    },
    Accessory {
        product_id: Option<Uuid>,
        name: String,
    },
    Payment,
    Charge {
        description: String,
    },
}

impl LineItemRequest {
    fn into_line(self, currency: Currency) -> NewLineItem {
        let kind = match self.kind {
            LineKindRequest::Cylinder { cylinder_type } => NewItemKind::Cylinder { cylinder_type },
            LineKindRequest::EmptyReturn { cylinder_type } => NewItemKind::EmptyReturn { cylinder_type },
            LineKindRequest::Buyback {
                cylinder_type,
                returned_condition,
                remaining_kg,
                original_sold_price,
            } => NewItemKind::Buyback {
                cylinder_type,
                returned_condition,
                remaining_kg,
                original_sold_price: Money::new(original_sold_price, currency),
            },
            LineKindRequest::Accessory { product_id, name } => NewItemKind::Accessory {
                product_id: product_id.map(ProductId::from_uuid),
                name,
            },
            LineKindRequest::Payment => NewItemKind::Payment,
            LineKindRequest::Charge { description } => NewItemKind::Charge { description },
        };
        NewLineItem::new(kind, self.quantity, Money::new(self.price_per_item, currency))
    }
}

impl CreateTransactionRequest {
    /// Converts the request into a recorder command in the ledger currency
    pub fn into_command(self, currency: Currency) -> RecordTransaction {
        RecordTransaction {
            transaction_type: self.transaction_type,
            customer_id: CustomerId::from_uuid(self.customer_id),
            date: self.date,
            time: self.time,
            items: self.items.into_iter().map(|i| i.into_line(currency)).collect(),
            payment_reference: self.payment_reference,
            notes: self.notes,
            amount_paid: self.amount_paid.map(|a| Money::new(a, currency)),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct VoidRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoidResponse {
    pub success: bool,
    pub bill_sno: String,
    pub warnings: Vec<ReconciliationWarning>,
}

#[derive(Debug, Serialize)]
pub struct TransactionItemResponse {
    pub id: Uuid,
    pub kind: ItemCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cylinder_type: Option<CylinderType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    pub price_per_item: Decimal,
    pub total_price: Decimal,
}

impl From<&TransactionItem> for TransactionItemResponse {
    fn from(item: &TransactionItem) -> Self {
        let description = match &item.kind {
            ItemKind::Accessory { name, .. } => Some(name.clone()),
            ItemKind::Charge { description } => Some(description.clone()),
            ItemKind::Buyback { details, .. } => Some(details.returned_condition.clone()),
            _ => None,
        };
        Self {
            id: *item.id.as_uuid(),
            kind: item.kind.category(),
            cylinder_type: item.kind.cylinder_type(),
            description,
            quantity: item.quantity,
            price_per_item: item.price_per_item.amount(),
            total_price: item.total_price.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub bill_sno: String,
    pub transaction_type: TransactionType,
    pub customer_id: Uuid,
    pub bill_date: NaiveDate,
    pub transaction_at: DateTime<Utc>,
    pub total_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unpaid_amount: Option<Decimal>,
    pub currency: Currency,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    pub voided: bool,
    pub items: Vec<TransactionItemResponse>,
}

impl From<LedgerTransaction> for TransactionResponse {
    fn from(t: LedgerTransaction) -> Self {
        Self {
            id: *t.id.as_uuid(),
            bill_sno: t.bill_sno,
            transaction_type: t.transaction_type,
            customer_id: *t.customer_id.as_uuid(),
            bill_date: t.bill_date,
            transaction_at: t.transaction_at,
            total_amount: t.total_amount.amount(),
            unpaid_amount: t.unpaid_amount.map(|m| m.amount()),
            currency: t.total_amount.currency(),
            payment_reference: t.payment_reference,
            notes: t.notes,
            created_by: t.created_by.as_str().to_string(),
            voided: t.void.is_some(),
            items: t.items.iter().map(TransactionItemResponse::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_line_items_parse_by_kind() {
        let body = serde_json::json!({
            "transaction_type": "SALE",
            "customer_id": Uuid::nil(),
            "date": "2024-03-01",
            "items": [
                {"kind": "cylinder", "cylinder_type": "DOMESTIC_11_8KG", "quantity": 2, "price_per_item": "5000"},
                {"kind": "accessory", "name": "Regulator", "quantity": 1, "price_per_item": "1500"},
                {"kind": "empty_return", "cylinder_type": "DOMESTIC_11_8KG", "quantity": 1}
            ],
            "amount_paid": "2000"
        });
        let request: CreateTransactionRequest = serde_json::from_value(body).unwrap();
        assert!(request.validate().is_ok());

        let command = request.into_command(Currency::PKR);
        assert_eq!(command.items.len(), 3);
        assert_eq!(
            command.items[0].kind,
            NewItemKind::Cylinder { cylinder_type: CylinderType::Domestic11_8Kg }
        );
        assert_eq!(command.items[1].price_per_item, Money::new(dec!(1500), Currency::PKR));
        assert!(command.items[2].price_per_item.is_zero());
        assert_eq!(command.amount_paid, Some(Money::new(dec!(2000), Currency::PKR)));
    }

    #[test]
    fn test_buyback_line_carries_original_price() {
        let body = serde_json::json!({
            "kind": "buyback",
            "cylinder_type": "DOMESTIC_11_8KG",
            "returned_condition": "Partially used",
            "remaining_kg": "5",
            "original_sold_price": "5000",
            "quantity": 1
        });
        let line: LineItemRequest = serde_json::from_value(body).unwrap();
        match line.into_line(Currency::PKR).kind {
            NewItemKind::Buyback { remaining_kg, original_sold_price, .. } => {
                assert_eq!(remaining_kg, dec!(5));
                assert_eq!(original_sold_price.amount(), dec!(5000));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_empty_items_fail_validation() {
        let body = serde_json::json!({
            "transaction_type": "PAYMENT",
            "customer_id": Uuid::nil(),
            "date": "2024-03-01",
            "items": []
        });
        let request: CreateTransactionRequest = serde_json::from_value(body).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let body = serde_json::json!({"kind": "voucher", "quantity": 1});
        assert!(serde_json::from_value::<LineItemRequest>(body).is_err());
    }
}
