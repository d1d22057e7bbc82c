//! Accessory stock: catalogue products and retail custom items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CustomItemId, Money, ProductId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: Option<String>,
    pub stock_quantity: i64,
    pub unit_price: Money,
    pub cost_price: Money,
    pub updated_at: DateTime<Utc>,
}

/// Retail-only stock items (regulators, pipes, stoves) kept outside the catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomItem {
    pub id: CustomItemId,
    pub name: String,
    pub item_type: String,
    pub quantity: i64,
    pub cost_price: Money,
    pub updated_at: DateTime<Utc>,
}

/// The stock table an accessory line was deducted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "table", content = "id", rename_all = "snake_case")]
pub enum StockSource {
    CustomItem(CustomItemId),
    Product(ProductId),
    Untracked,
}

impl StockSource {
    pub fn is_tracked(&self) -> bool {
        !matches!(self, StockSource::Untracked)
    }
}

/// Case-insensitive exact name comparison used for catalogue lookups
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Case-insensitive containment used for the retail fuzzy product lookup
pub fn name_contains(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    !needle.is_empty() && haystack.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matching() {
        assert!(same_name("Regulator ", "regulator"));
        assert!(!same_name("Regulator HP", "regulator"));
        assert!(name_contains("Regulator HP", "regulator"));
        assert!(!name_contains("Regulator HP", "  "));
    }
}
