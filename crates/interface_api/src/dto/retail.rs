//! B2C (walk-in) transaction DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use core_kernel::{Currency, Money, RetailCustomerId};
use domain_ledger::retail::model::{
    NewAccessoryItem, NewGasItem, NewSecurityItem, PaymentMethod, RecordRetailTransaction,
    RetailTransaction, SecurityDirection,
};
use domain_ledger::{CylinderType, StockSource, TransactionType};

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "has_any_item"))]
pub struct CreateRetailTransactionRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "date is required"))]
    pub date: String,
    pub time: Option<String>,
    #[serde(default)]
    pub gas_items: Vec<GasItemRequest>,
    #[serde(default)]
    pub security_items: Vec<SecurityItemRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub accessory_items: Vec<AccessoryItemRequest>,
    pub delivery_charges: Option<Decimal>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn has_any_item(request: &CreateRetailTransactionRequest) -> Result<(), ValidationError> {
    if request.gas_items.is_empty() && request.security_items.is_empty() && request.accessory_items.is_empty() {
        let mut error = ValidationError::new("empty");
        error.message = Some("at least one item is required".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct GasItemRequest {
    pub cylinder_type: CylinderType,
    pub quantity: i64,
    pub price_per_item: Decimal,
    #[serde(default)]
    pub cost_per_item: Decimal,
}

/// A security deposit taken, or refunded when `is_return` is set
#[derive(Debug, Deserialize)]
pub struct SecurityItemRequest {
    pub cylinder_type: CylinderType,
    pub quantity: i64,
    pub price_per_item: Decimal,
    #[serde(default)]
    pub is_return: bool,
    #[serde(default)]
    pub deduction_per_item: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AccessoryItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub item_type: String,
    pub quantity: i64,
    pub price_per_item: Decimal,
    #[serde(default)]
    pub cost_per_item: Decimal,
}

impl CreateRetailTransactionRequest {
    pub fn into_command(self, currency: Currency) -> RecordRetailTransaction {
        let money = |amount: Decimal| Money::new(amount, currency);
        RecordRetailTransaction {
            customer_id: RetailCustomerId::from_uuid(self.customer_id),
            date: self.date,
            time: self.time,
            gas_items: self
                .gas_items
                .into_iter()
                .map(|g| NewGasItem {
                    cylinder_type: g.cylinder_type,
                    quantity: g.quantity,
                    price_per_item: money(g.price_per_item),
                    cost_per_item: money(g.cost_per_item),
                })
                .collect(),
            security_items: self
                .security_items
                .into_iter()
                .map(|s| NewSecurityItem {
                    cylinder_type: s.cylinder_type,
                    quantity: s.quantity,
                    price_per_item: money(s.price_per_item),
                    direction: if s.is_return {
                        SecurityDirection::Return { deduction_per_item: money(s.deduction_per_item) }
                    } else {
                        SecurityDirection::Deposit
                    },
                })
                .collect(),
            accessory_items: self
                .accessory_items
                .into_iter()
                .map(|a| NewAccessoryItem {
                    name: a.name,
                    item_type: a.item_type,
                    quantity: a.quantity,
                    price_per_item: money(a.price_per_item),
                    cost_per_item: money(a.cost_per_item),
                })
                .collect(),
            delivery_charges: self.delivery_charges.map(money),
            payment_method: self.payment_method,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RetailLineResponse {
    pub description: String,
    pub quantity: u32,
    pub price_per_item: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct RetailTransactionResponse {
    pub id: Uuid,
    pub bill_sno: String,
    pub transaction_type: TransactionType,
    pub customer_id: Uuid,
    pub bill_date: NaiveDate,
    pub transaction_at: DateTime<Utc>,
    pub total_amount: Decimal,
    pub delivery_charges: Decimal,
    pub final_amount: Decimal,
    pub actual_profit: Decimal,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub voided: bool,
    pub lines: Vec<RetailLineResponse>,
}

fn stock_label(source: &StockSource) -> &'static str {
    match source {
        StockSource::Product(_) => "product",
        StockSource::CustomItem(_) => "custom item",
        StockSource::Untracked => "untracked",
    }
}

impl From<RetailTransaction> for RetailTransactionResponse {
    fn from(t: RetailTransaction) -> Self {
        let mut lines = Vec::new();
        for gas in &t.gas_items {
            lines.push(RetailLineResponse {
                description: format!("Gas refill {}", gas.cylinder_type),
                quantity: gas.quantity,
                price_per_item: gas.price_per_item.amount(),
                total_price: gas.total_price.amount(),
            });
        }
        for security in &t.security_items {
            let label = if security.is_return() { "Security refund" } else { "Security deposit" };
            lines.push(RetailLineResponse {
                description: format!("{} {}", label, security.cylinder_type),
                quantity: security.quantity,
                price_per_item: security.price_per_item.amount(),
                total_price: security.total_price.amount(),
            });
        }
        for accessory in &t.accessory_items {
            lines.push(RetailLineResponse {
                description: format!("{} ({})", accessory.name, stock_label(&accessory.stock_source)),
                quantity: accessory.quantity,
                price_per_item: accessory.price_per_item.amount(),
                total_price: accessory.total_price.amount(),
            });
        }

        Self {
            id: *t.id.as_uuid(),
            bill_sno: t.bill_sno,
            transaction_type: t.transaction_type,
            customer_id: *t.customer_id.as_uuid(),
            bill_date: t.bill_date,
            transaction_at: t.transaction_at,
            total_amount: t.total_amount.amount(),
            delivery_charges: t.delivery_charges.amount(),
            final_amount: t.final_amount.amount(),
            actual_profit: t.actual_profit.amount(),
            currency: t.final_amount.currency(),
            payment_method: t.payment_method,
            notes: t.notes,
            voided: t.void.is_some(),
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_refund_line_becomes_return_direction() {
        let body = serde_json::json!({
            "customer_id": Uuid::nil(),
            "date": "2024-03-01",
            "security_items": [{
                "cylinder_type": "DOMESTIC_11_8KG",
                "quantity": 1,
                "price_per_item": "3000",
                "is_return": true,
                "deduction_per_item": "200"
            }]
        });
        let request: CreateRetailTransactionRequest = serde_json::from_value(body).unwrap();
        assert!(request.validate().is_ok());

        let command = request.into_command(Currency::PKR);
        assert_eq!(command.payment_method, PaymentMethod::Cash);
        assert_eq!(
            command.security_items[0].direction,
            SecurityDirection::Return { deduction_per_item: Money::new(dec!(200), Currency::PKR) }
        );
        assert_eq!(command.derived_type(), TransactionType::ReturnEmpty);
    }

    #[test]
    fn test_request_without_items_is_invalid() {
        let body = serde_json::json!({"customer_id": Uuid::nil(), "date": "2024-03-01"});
        let request: CreateRetailTransactionRequest = serde_json::from_value(body).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_blank_accessory_name_is_invalid() {
        let body = serde_json::json!({
            "customer_id": Uuid::nil(),
            "date": "2024-03-01",
            "accessory_items": [{"name": "", "item_type": "Accessory", "quantity": 1, "price_per_item": "400"}]
        });
        let request: CreateRetailTransactionRequest = serde_json::from_value(body).unwrap();
        assert!(request.validate().is_err());
    }
}
