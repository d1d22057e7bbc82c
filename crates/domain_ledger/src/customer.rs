//! B2B customer model and due counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, Money};

use crate::cylinder::CylinderType;

/// A business customer with a running account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: Money,
    pub payment_terms_days: u32,
    /// Positive means the customer owes money
    pub ledger_balance: Money,
    pub dues: DueCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cylinders currently owed back by a customer, per type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DueCounters {
    pub domestic_11_8kg: u32,
    pub standard_15kg: u32,
    pub commercial_45_4kg: u32,
}

impl DueCounters {
    pub fn get(&self, cylinder_type: CylinderType) -> u32 {
        match cylinder_type {
            CylinderType::Domestic11_8Kg => self.domestic_11_8kg,
            CylinderType::Standard15Kg => self.standard_15kg,
            CylinderType::Commercial45_4Kg => self.commercial_45_4kg,
        }
    }

    fn slot(&mut self, cylinder_type: CylinderType) -> &mut u32 {
        match cylinder_type {
            CylinderType::Domestic11_8Kg => &mut self.domestic_11_8kg,
            CylinderType::Standard15Kg => &mut self.standard_15kg,
            CylinderType::Commercial45_4Kg => &mut self.commercial_45_4kg,
        }
    }

    /// Applies a signed change, clamping every counter at zero
    ///
    /// Returns the change that was actually applied. Recording that value
    /// instead of the requested one is what lets a reversal restore the
    /// counters exactly.
    pub fn apply(&mut self, delta: &DueDelta) -> DueDelta {
        let mut applied = DueDelta::default();
        for cylinder_type in CylinderType::ALL {
            let current = i64::from(self.get(cylinder_type));
            let next = (current + delta.get(cylinder_type)).clamp(0, i64::from(u32::MAX));
            *self.slot(cylinder_type) = next as u32;
            applied.add(cylinder_type, next - current);
        }
        applied
    }

    pub fn total(&self) -> u64 {
        u64::from(self.domestic_11_8kg) + u64::from(self.standard_15kg) + u64::from(self.commercial_45_4kg)
    }
}

/// A signed per-type change to the due counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DueDelta {
    pub domestic_11_8kg: i64,
    pub standard_15kg: i64,
    pub commercial_45_4kg: i64,
}

impl DueDelta {
    pub fn get(&self, cylinder_type: CylinderType) -> i64 {
        match cylinder_type {
            CylinderType::Domestic11_8Kg => self.domestic_11_8kg,
            CylinderType::Standard15Kg => self.standard_15kg,
            CylinderType::Commercial45_4Kg => self.commercial_45_4kg,
        }
    }

    pub fn add(&mut self, cylinder_type: CylinderType, quantity: i64) {
        match cylinder_type {
            CylinderType::Domestic11_8Kg => self.domestic_11_8kg += quantity,
            CylinderType::Standard15Kg => self.standard_15kg += quantity,
            CylinderType::Commercial45_4Kg => self.commercial_45_4kg += quantity,
        }
    }

    pub fn negate(&self) -> DueDelta {
        DueDelta {
            domestic_11_8kg: -self.domestic_11_8kg,
            standard_15kg: -self.standard_15kg,
            commercial_45_4kg: -self.commercial_45_4kg,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == DueDelta::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_clamps_at_zero() {
        let mut dues = DueCounters { standard_15kg: 1, ..Default::default() };
        let mut delta = DueDelta::default();
        delta.add(CylinderType::Standard15Kg, -3);

        let applied = dues.apply(&delta);

        assert_eq!(dues.standard_15kg, 0);
        assert_eq!(applied.standard_15kg, -1);
    }

    #[test]
    fn test_applied_delta_reverses_exactly() {
        let mut dues = DueCounters { domestic_11_8kg: 2, ..Default::default() };
        let before = dues;
        let mut delta = DueDelta::default();
        delta.add(CylinderType::Domestic11_8Kg, -5);
        delta.add(CylinderType::Commercial45_4Kg, 4);

        let applied = dues.apply(&delta);
        dues.apply(&applied.negate());

        assert_eq!(dues, before);
    }
}
