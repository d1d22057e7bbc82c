//! Property-Based Test Generators
//!
//! Proptest strategies for ledger inputs. Everything generated is valid for
//! the transaction type it belongs to, so properties can focus on the effects
//! instead of on validation.

use proptest::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use core_kernel::{CustomerId, Money};
use domain_ledger::{CylinderType, NewLineItem, RecordTransaction, TransactionType};

use crate::fixtures::{pkr, DateFixtures, LineFixtures};

/// Strategy for generating cylinder types
pub fn cylinder_type_strategy() -> impl Strategy<Value = CylinderType> {
    prop_oneof![
        Just(CylinderType::Domestic11_8Kg),
        Just(CylinderType::Standard15Kg),
        Just(CylinderType::Commercial45_4Kg),
    ]
}

/// Strategy for generating line quantities (1 to 10)
pub fn quantity_strategy() -> impl Strategy<Value = i64> {
    1i64..=10i64
}

/// Strategy for generating whole-rupee prices
pub fn price_strategy() -> impl Strategy<Value = Decimal> {
    (100i64..20_000i64).prop_map(Decimal::from)
}

/// Strategy for generating PKR amounts with paisa
pub fn pkr_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..5_000_000i64).prop_map(|paisa| Money::from_minor(paisa, core_kernel::Currency::PKR))
}

/// Strategy for generating remaining gas within a cylinder's capacity
pub fn remaining_kg_strategy(cylinder_type: CylinderType) -> impl Strategy<Value = Decimal> {
    let max_tenths = (cylinder_type.nominal_capacity_kg() * Decimal::from(10))
        .to_i64()
        .unwrap_or(0);
    (0i64..=max_tenths).prop_map(|tenths| Decimal::new(tenths, 1))
}

fn cylinder_line_strategy() -> impl Strategy<Value = NewLineItem> {
    (cylinder_type_strategy(), quantity_strategy(), price_strategy())
        .prop_map(|(t, q, p)| LineFixtures::cylinders(t, q, p))
}

fn empty_return_line_strategy() -> impl Strategy<Value = NewLineItem> {
    (cylinder_type_strategy(), quantity_strategy()).prop_map(|(t, q)| LineFixtures::empty_return(t, q))
}

fn buyback_line_strategy() -> impl Strategy<Value = NewLineItem> {
    cylinder_type_strategy().prop_flat_map(|t| {
        (quantity_strategy(), remaining_kg_strategy(t), price_strategy())
            .prop_map(move |(q, kg, p)| LineFixtures::buyback(t, q, kg, p))
    })
}

fn sale_strategy(customer_id: CustomerId) -> impl Strategy<Value = RecordTransaction> {
    (
        proptest::collection::vec(cylinder_line_strategy(), 1..3),
        proptest::option::of(empty_return_line_strategy()),
        proptest::option::of(price_strategy()),
        0u32..=100u32,
    )
        .prop_map(move |(cylinders, empties, accessory_price, paid_percent)| {
            let mut request = RecordTransaction::new(TransactionType::Sale, customer_id, DateFixtures::bill_day());
            let mut total = Decimal::ZERO;
            for line in cylinders {
                total += line.price_per_item.amount() * Decimal::from(line.quantity);
                request = request.with_item(line);
            }
            if let Some(empties) = empties {
                request = request.with_item(empties);
            }
            if let Some(price) = accessory_price {
                // Untracked: no product carries this name
                total += price;
                request = request.with_item(LineFixtures::accessory(None, "Gas Lighter", 1, price));
            }
            if paid_percent < 100 {
                let paid = (total * Decimal::from(paid_percent) / Decimal::from(100)).round_dp(2);
                request = request.with_amount_paid(pkr(paid));
            }
            request
        })
}

/// Strategy for generating valid B2B transactions against one customer
///
/// Sales only carry untracked accessories, so no stock needs to be seeded.
pub fn record_transaction_strategy(customer_id: CustomerId) -> impl Strategy<Value = RecordTransaction> {
    prop_oneof![
        3 => sale_strategy(customer_id),
        2 => price_strategy().prop_map(move |amount| {
            RecordTransaction::payment(customer_id, pkr(amount), DateFixtures::bill_day())
        }),
        2 => proptest::collection::vec(empty_return_line_strategy(), 1..3).prop_map(move |lines| {
            lines.into_iter().fold(
                RecordTransaction::new(TransactionType::ReturnEmpty, customer_id, DateFixtures::bill_day()),
                RecordTransaction::with_item,
            )
        }),
        1 => buyback_line_strategy().prop_map(move |line| {
            RecordTransaction::new(TransactionType::Buyback, customer_id, DateFixtures::bill_day()).with_item(line)
        }),
        1 => price_strategy().prop_map(move |amount| {
            RecordTransaction::new(TransactionType::CreditNote, customer_id, DateFixtures::bill_day())
                .with_item(LineFixtures::charge("Rate difference", amount))
        }),
        1 => price_strategy().prop_map(move |amount| {
            RecordTransaction::new(TransactionType::Adjustment, customer_id, DateFixtures::bill_day())
                .with_item(LineFixtures::charge("Opening balance correction", amount))
        }),
    ]
}

/// Strategy for generating short transaction histories
pub fn transaction_history_strategy(
    customer_id: CustomerId,
    max_len: usize,
) -> impl Strategy<Value = Vec<RecordTransaction>> {
    proptest::collection::vec(record_transaction_strategy(customer_id), 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_ledger::NewItemKind;

    proptest! {
        #[test]
        fn remaining_gas_fits_the_cylinder(
            (t, kg) in cylinder_type_strategy().prop_flat_map(|t| (Just(t), remaining_kg_strategy(t)))
        ) {
            prop_assert!(kg >= Decimal::ZERO);
            prop_assert!(kg <= t.nominal_capacity_kg());
        }

        #[test]
        fn generated_items_are_permitted(request in record_transaction_strategy(CustomerId::new())) {
            prop_assert!(!request.items.is_empty());
            for item in &request.items {
                prop_assert!(request.transaction_type.permits(item.kind.category()));
                prop_assert!(item.quantity > 0);
            }
        }

        #[test]
        fn amount_paid_never_exceeds_the_total(request in record_transaction_strategy(CustomerId::new())) {
            if let Some(paid) = request.amount_paid {
                let total: Decimal = request
                    .items
                    .iter()
                    .filter(|i| !matches!(i.kind, NewItemKind::EmptyReturn { .. }))
                    .map(|i| i.price_per_item.amount() * Decimal::from(i.quantity))
                    .sum();
                prop_assert!(paid.amount() <= total);
            }
        }
    }
}
