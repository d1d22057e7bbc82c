//! Ledger Balance Calculator
//!
//! Maps a transaction to its effect on the customer's running balance and due
//! counters:
//!
//! | Type                     | Balance                 | Dues                               |
//! |--------------------------|-------------------------|------------------------------------|
//! | SALE                     | `+ total` (or unpaid)   | `+ delivered`, `- empties returned` |
//! | PAYMENT                  | `- total`               |                                    |
//! | BUYBACK                  | `- total`               | `- bought back`                    |
//! | RETURN_EMPTY             |                         | `- returned`                       |
//! | ADJUSTMENT / CREDIT_NOTE | `- total`               |                                    |
//!
//! Due counters clamp at zero, so the effect that is *applied* may be smaller
//! than the one requested. The applied effect is what gets recorded on the
//! transaction and what a reversal negates.

use serde::{Deserialize, Serialize};

use core_kernel::{Money, MoneyError};

use crate::customer::{Customer, DueDelta};
use crate::transaction::{ItemKind, TransactionItem, TransactionType};

/// A signed change to a customer's balance and due counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEffect {
    pub balance: Money,
    pub dues: DueDelta,
}

impl LedgerEffect {
    pub fn negate(&self) -> LedgerEffect {
        LedgerEffect {
            balance: -self.balance,
            dues: self.dues.negate(),
        }
    }
}

/// Signed balance change of a transaction
///
/// For a SALE with an amount paid at the counter, only the unpaid part goes
/// onto the account.
pub fn balance_change(transaction_type: TransactionType, total: Money, unpaid: Option<Money>) -> Money {
    match transaction_type {
        TransactionType::Sale => unpaid.unwrap_or(total),
        TransactionType::Payment
        | TransactionType::Buyback
        | TransactionType::Adjustment
        | TransactionType::CreditNote => -total,
        TransactionType::ReturnEmpty => Money::zero(total.currency()),
    }
}

/// Requested due-counter change of a transaction, before clamping
pub fn due_change(transaction_type: TransactionType, items: &[TransactionItem]) -> DueDelta {
    let mut delta = DueDelta::default();
    for item in items {
        let quantity = i64::from(item.quantity);
        match (transaction_type, &item.kind) {
            (TransactionType::Sale, ItemKind::Cylinder { cylinder_type }) => {
                delta.add(*cylinder_type, quantity)
            }
            (TransactionType::Sale | TransactionType::ReturnEmpty, ItemKind::EmptyReturn { cylinder_type }) => {
                delta.add(*cylinder_type, -quantity)
            }
            (TransactionType::Buyback, ItemKind::Buyback { cylinder_type, .. }) => {
                delta.add(*cylinder_type, -quantity)
            }
            _ => {}
        }
    }
    delta
}

/// Requested effect of a priced transaction
pub fn effect_of(
    transaction_type: TransactionType,
    total: Money,
    unpaid: Option<Money>,
    items: &[TransactionItem],
) -> LedgerEffect {
    LedgerEffect {
        balance: balance_change(transaction_type, total, unpaid),
        dues: due_change(transaction_type, items),
    }
}

/// Applies an effect to the customer and returns the effect actually applied
pub fn apply(customer: &mut Customer, effect: &LedgerEffect) -> Result<LedgerEffect, MoneyError> {
    customer.ledger_balance = customer.ledger_balance.checked_add(&effect.balance)?;
    let dues = customer.dues.apply(&effect.dues);
    Ok(LedgerEffect {
        balance: effect.balance,
        dues,
    })
}

/// Inverse of the effect recorded on a transaction
pub fn reversal_of(balance_effect: Money, due_effect: DueDelta) -> LedgerEffect {
    LedgerEffect {
        balance: balance_effect,
        dues: due_effect,
    }
    .negate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cylinder::CylinderType;
    use crate::customer::DueCounters;
    use chrono::Utc;
    use core_kernel::{CustomerId, Currency, TransactionItemId};
    use rust_decimal_macros::dec;

    fn pkr(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::PKR)
    }

    fn customer(balance: Money, dues: DueCounters) -> Customer {
        Customer {
            id: CustomerId::new(),
            name: "Ali Traders".into(),
            contact_person: None,
            phone: None,
            email: None,
            address: None,
            credit_limit: pkr(dec!(0)),
            payment_terms_days: 30,
            ledger_balance: balance,
            dues,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(kind: ItemKind, quantity: u32) -> TransactionItem {
        TransactionItem {
            id: TransactionItemId::new(),
            kind,
            quantity,
            price_per_item: pkr(dec!(0)),
            total_price: pkr(dec!(0)),
        }
    }

    #[test]
    fn test_balance_table() {
        let total = pkr(dec!(1000));
        assert_eq!(balance_change(TransactionType::Sale, total, None), total);
        assert_eq!(balance_change(TransactionType::Sale, total, Some(pkr(dec!(400)))), pkr(dec!(400)));
        assert_eq!(balance_change(TransactionType::Payment, total, None), -total);
        assert_eq!(balance_change(TransactionType::Buyback, total, None), -total);
        assert_eq!(balance_change(TransactionType::CreditNote, total, None), -total);
        assert!(balance_change(TransactionType::ReturnEmpty, total, None).is_zero());
    }

    #[test]
    fn test_sale_dues_net_deliveries_against_empties() {
        let items = vec![
            line(ItemKind::Cylinder { cylinder_type: CylinderType::Domestic11_8Kg }, 3),
            line(ItemKind::EmptyReturn { cylinder_type: CylinderType::Domestic11_8Kg }, 1),
            line(ItemKind::Charge { description: "Delivery".into() }, 1),
        ];
        let delta = due_change(TransactionType::Sale, &items);
        assert_eq!(delta.domestic_11_8kg, 2);
        assert_eq!(delta.standard_15kg, 0);
    }

    #[test]
    fn test_payment_leaves_dues() {
        let items = vec![line(ItemKind::Payment, 1)];
        assert!(due_change(TransactionType::Payment, &items).is_zero());
    }

    #[test]
    fn test_apply_then_reverse_restores_customer() {
        let mut c = customer(pkr(dec!(250)), DueCounters { standard_15kg: 1, ..Default::default() });
        let before = c.clone();
        let items = vec![line(
            ItemKind::EmptyReturn { cylinder_type: CylinderType::Standard15Kg },
            4,
        )];
        let requested = effect_of(TransactionType::ReturnEmpty, pkr(dec!(0)), None, &items);

        let applied = apply(&mut c, &requested).unwrap();
        assert_eq!(c.dues.standard_15kg, 0);
        assert_eq!(applied.dues.standard_15kg, -1);

        apply(&mut c, &reversal_of(applied.balance, applied.dues)).unwrap();
        assert_eq!(c.ledger_balance, before.ledger_balance);
        assert_eq!(c.dues, before.dues);
    }
}
