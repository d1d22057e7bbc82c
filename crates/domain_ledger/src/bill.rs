//! Bill number composition
//!
//! Bill numbers are `<PREFIX><YYYYMMDD><sequence>`, the sequence restarting
//! every business day and zero-padded to a fixed width. The width is also the
//! daily capacity, so all bill numbers of a day have the same length and sort
//! as strings in issue order. The per-day counter itself lives in the store so
//! that it is incremented atomically inside the recording unit of work.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Prefix and zero-padding of generated bill numbers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillNumberFormat {
    pub prefix: String,
    pub width: usize,
}

impl BillNumberFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    /// Largest sequence that fits the configured width
    pub fn capacity(&self) -> u64 {
        u32::try_from(self.width)
            .ok()
            .and_then(|width| 10u64.checked_pow(width))
            .map_or(u64::MAX, |limit| limit - 1)
    }

    /// Composes the bill number for the `sequence`-th bill of `date`
    ///
    /// Fails once the day's sequence no longer fits the width.
    pub fn compose(&self, date: NaiveDate, sequence: u32) -> Result<String, LedgerError> {
        if u64::from(sequence) > self.capacity() {
            return Err(LedgerError::validation(format!(
                "Bill numbers for {} are exhausted: {}-digit sequences allow {} bills per day",
                date,
                self.width,
                self.capacity()
            )));
        }
        Ok(format!(
            "{}{}{:0width$}",
            self.prefix,
            date.format("%Y%m%d"),
            sequence,
            width = self.width
        ))
    }
}

impl Default for BillNumberFormat {
    fn default() -> Self {
        Self::new("BILL-", 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_compose_pads_sequence() {
        let format = BillNumberFormat::default();
        assert_eq!(format.compose(day(), 1).unwrap(), "BILL-202403010001");
        assert_eq!(format.compose(day(), 42).unwrap(), "BILL-202403010042");
    }

    #[test]
    fn test_last_bill_of_day_sorts_after_earlier_ones() {
        let format = BillNumberFormat::default();
        let last = format.compose(day(), 9999).unwrap();
        assert_eq!(last, "BILL-202403019999");
        assert!(format.compose(day(), 1000).unwrap() < last);
    }

    #[test]
    fn test_sequence_beyond_width_is_rejected() {
        let format = BillNumberFormat::default();
        assert_eq!(format.capacity(), 9999);
        let result = format.compose(day(), 10_000);
        assert!(matches!(result, Err(LedgerError::Validation(_))));

        let narrow = BillNumberFormat::new("B2C-", 2);
        assert!(narrow.compose(day(), 99).is_ok());
        assert!(narrow.compose(day(), 100).is_err());
    }
}
