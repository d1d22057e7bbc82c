//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that say what differed instead of
//! dumping two large structs.

use rust_decimal::Decimal;

use core_kernel::Money;
use domain_ledger::{Customer, Cylinder, CylinderLocation, CylinderStatus, CylinderType, Reconciliation};

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts a customer's cached balance
pub fn assert_balance(customer: &Customer, expected: Decimal) {
    assert_eq!(
        customer.ledger_balance.amount(),
        expected,
        "Balance of {}: expected {}, got {}",
        customer.name,
        expected,
        customer.ledger_balance.amount()
    );
}

/// Asserts the due counter of one cylinder type
pub fn assert_due(customer: &Customer, cylinder_type: CylinderType, expected: u32) {
    assert_eq!(
        customer.dues.get(cylinder_type),
        expected,
        "{} due for {}: expected {}, got {}",
        cylinder_type,
        customer.name,
        expected,
        customer.dues.get(cylinder_type)
    );
}

/// Counts cylinders of a type in a status at a location
pub fn count_cylinders(
    cylinders: &[Cylinder],
    cylinder_type: CylinderType,
    status: CylinderStatus,
    location: &CylinderLocation,
) -> usize {
    cylinders
        .iter()
        .filter(|c| c.cylinder_type == cylinder_type && c.status == status && &c.location == location)
        .count()
}

/// Asserts how many cylinders of a type sit in a status at a location
pub fn assert_cylinder_count(
    cylinders: &[Cylinder],
    cylinder_type: CylinderType,
    status: CylinderStatus,
    location: &CylinderLocation,
    expected: usize,
) {
    let found = count_cylinders(cylinders, cylinder_type, status, location);
    assert_eq!(
        found, expected,
        "Expected {} {} cylinders {} at '{}', found {}",
        expected,
        cylinder_type,
        status.as_str(),
        location,
        found
    );
}

/// Asserts that the cached ledger matches the replayed history
pub fn assert_reconciled(reconciliation: &Reconciliation) {
    assert!(
        reconciliation.is_consistent,
        "Ledger of {} is inconsistent: cached balance {} vs projected {}, cached dues {:?} vs projected {:?}",
        reconciliation.customer_name,
        reconciliation.cached_balance,
        reconciliation.projected.balance,
        reconciliation.cached_dues,
        reconciliation.projected.dues
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{CustomerBuilder, CylinderBuilder};
    use crate::fixtures::pkr;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_money_approx_eq_passes() {
        assert_money_approx_eq(&pkr(dec!(1271.1864)), &pkr(dec!(1271.19)), dec!(0.01));
    }

    #[test]
    #[should_panic(expected = "Currency mismatch")]
    fn test_assert_money_approx_eq_currency_mismatch() {
        let usd = Money::new(dec!(100), core_kernel::Currency::USD);
        assert_money_approx_eq(&pkr(dec!(100)), &usd, dec!(0.01));
    }

    #[test]
    fn test_balance_and_due() {
        let customer = CustomerBuilder::new()
            .with_balance(dec!(2500))
            .with_due(CylinderType::Standard15Kg, 3)
            .build();
        assert_balance(&customer, dec!(2500));
        assert_due(&customer, CylinderType::Standard15Kg, 3);
        assert_due(&customer, CylinderType::Domestic11_8Kg, 0);
    }

    #[test]
    #[should_panic(expected = "Expected 2 DOMESTIC_11_8KG cylinders")]
    fn test_cylinder_count_reports_shortfall() {
        let cylinders = vec![CylinderBuilder::new().build()];
        assert_cylinder_count(
            &cylinders,
            CylinderType::Domestic11_8Kg,
            CylinderStatus::Full,
            &CylinderLocation::StoreReadyForSale,
            2,
        );
    }
}
