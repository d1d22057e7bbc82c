//! Line item pricing
//!
//! Ordinary lines are `quantity * price_per_item`. A bought-back cylinder is
//! priced from the gas left in it:
//!
//! ```text
//! price_per_item = original_sold_price * remaining_kg / nominal_capacity_kg * BUYBACK_RATE
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Currency, Money, TransactionItemId};

use crate::cylinder::CylinderType;
use crate::error::LedgerError;
use crate::transaction::{BuybackDetails, ItemKind, NewItemKind, NewLineItem, TransactionItem};

/// Share of the pro-rated gas value paid back to the customer
pub const BUYBACK_RATE: Decimal = dec!(0.6);

/// Per-cylinder buyback price for the gas remaining in a returned cylinder
pub fn buyback_price_per_item(
    cylinder_type: CylinderType,
    remaining_kg: Decimal,
    original_sold_price: Money,
) -> Result<Money, LedgerError> {
    let capacity = cylinder_type.nominal_capacity_kg();
    if remaining_kg < Decimal::ZERO || remaining_kg > capacity {
        return Err(LedgerError::validation(format!(
            "Remaining gas {} kg is outside 0..={} kg for {}",
            remaining_kg, capacity, cylinder_type
        )));
    }
    if original_sold_price.is_negative() {
        return Err(LedgerError::validation("Original sold price cannot be negative"));
    }

    // Full precision until the final Money rounding
    let value = original_sold_price.amount() * remaining_kg / capacity * BUYBACK_RATE;
    Ok(Money::new(value, original_sold_price.currency()))
}

/// Validates and prices one submitted line
pub fn price_line(item: &NewLineItem, currency: Currency) -> Result<TransactionItem, LedgerError> {
    let quantity = checked_quantity(item.quantity)?;
    ensure_currency(&item.price_per_item, currency)?;
    if item.price_per_item.is_negative() {
        return Err(LedgerError::validation("Price per item cannot be negative"));
    }

    let line_total = item.price_per_item.multiply(Decimal::from(quantity));
    let (kind, price_per_item, total_price) = match &item.kind {
        NewItemKind::Buyback {
            cylinder_type,
            returned_condition,
            remaining_kg,
            original_sold_price,
        } => {
            ensure_currency(original_sold_price, currency)?;
            let per_item = buyback_price_per_item(*cylinder_type, *remaining_kg, *original_sold_price)?;
            let total = per_item.multiply(Decimal::from(quantity));
            let details = BuybackDetails {
                returned_condition: returned_condition.clone(),
                remaining_kg: *remaining_kg,
                original_sold_price: *original_sold_price,
                buyback_rate: BUYBACK_RATE,
                buyback_price_per_item: per_item,
                buyback_total: total,
            };
            (
                ItemKind::Buyback {
                    cylinder_type: *cylinder_type,
                    details,
                },
                per_item,
                total,
            )
        }
        NewItemKind::Cylinder { cylinder_type } => (
            ItemKind::Cylinder {
                cylinder_type: *cylinder_type,
            },
            item.price_per_item,
            line_total,
        ),
        NewItemKind::EmptyReturn { cylinder_type } => (
            ItemKind::EmptyReturn {
                cylinder_type: *cylinder_type,
            },
            item.price_per_item,
            line_total,
        ),
        NewItemKind::Accessory { product_id, name } => {
            if name.trim().is_empty() && product_id.is_none() {
                return Err(LedgerError::validation("Accessory line needs a product or a name"));
            }
            (
                ItemKind::Accessory {
                    product_id: *product_id,
                    name: name.trim().to_string(),
                },
                item.price_per_item,
                line_total,
            )
        }
        NewItemKind::Payment => (ItemKind::Payment, item.price_per_item, line_total),
        NewItemKind::Charge { description } => (
            ItemKind::Charge {
                description: description.clone(),
            },
            item.price_per_item,
            line_total,
        ),
    };

    Ok(TransactionItem {
        id: TransactionItemId::new_v7(),
        kind,
        quantity,
        price_per_item,
        total_price,
    })
}

pub(crate) fn checked_quantity(quantity: i64) -> Result<u32, LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::validation(format!(
            "Quantity must be positive, got {}",
            quantity
        )));
    }
    u32::try_from(quantity)
        .map_err(|_| LedgerError::validation(format!("Quantity {} is too large", quantity)))
}

pub(crate) fn ensure_currency(amount: &Money, currency: Currency) -> Result<(), LedgerError> {
    if amount.currency() != currency {
        return Err(LedgerError::validation(format!(
            "Amount in {} does not match ledger currency {}",
            amount.currency(),
            currency
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkr(amount: Decimal) -> Money {
        Money::new(amount, Currency::PKR)
    }

    #[test]
    fn test_buyback_formula() {
        let price = buyback_price_per_item(CylinderType::Domestic11_8Kg, dec!(5), pkr(dec!(5000))).unwrap();
        // 5000 * 5 / 11.8 * 0.6 = 1271.18644...
        assert_eq!(price.amount(), dec!(1271.1864));
        assert_eq!(price.round_to_currency().amount(), dec!(1271.19));
    }

    #[test]
    fn test_buyback_rejects_overfull_cylinder() {
        let result = buyback_price_per_item(CylinderType::Standard15Kg, dec!(15.5), pkr(dec!(5000)));
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_buyback_line_total_uses_buyback_price() {
        let line = NewLineItem::new(
            NewItemKind::Buyback {
                cylinder_type: CylinderType::Domestic11_8Kg,
                returned_condition: "GOOD".into(),
                remaining_kg: dec!(5),
                original_sold_price: pkr(dec!(5000)),
            },
            2,
            pkr(dec!(999)),
        );
        let priced = price_line(&line, Currency::PKR).unwrap();
        assert_eq!(priced.price_per_item.amount(), dec!(1271.1864));
        assert_eq!(priced.total_price.amount(), dec!(2542.3728));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        for quantity in [0, -2] {
            let line = NewLineItem::new(NewItemKind::Payment, quantity, pkr(dec!(100)));
            assert!(matches!(price_line(&line, Currency::PKR), Err(LedgerError::Validation(_))));
        }
    }

    #[test]
    fn test_foreign_currency_rejected() {
        let line = NewLineItem::new(NewItemKind::Payment, 1, Money::new(dec!(100), Currency::USD));
        assert!(matches!(price_line(&line, Currency::PKR), Err(LedgerError::Validation(_))));
    }
}
