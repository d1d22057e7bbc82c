//! Cylinder model
//!
//! Physical cylinders carry a status, a location and, when they are out with a
//! customer, an explicit holder reference. Locations render to the strings the
//! counter staff see ("Store - Ready for Sale", "Customer: Ali Traders", ...)
//! but inventory queries match on the typed value and the holder, never on
//! substrings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CustomerId, CylinderId, RetailCustomerId, RetailTransactionId, TransactionId};

/// Cylinder size classes tracked by the due counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CylinderType {
    #[serde(rename = "DOMESTIC_11_8KG")]
    Domestic11_8Kg,
    #[serde(rename = "STANDARD_15KG")]
    Standard15Kg,
    #[serde(rename = "COMMERCIAL_45_4KG")]
    Commercial45_4Kg,
}

impl CylinderType {
    pub const ALL: [CylinderType; 3] = [
        CylinderType::Domestic11_8Kg,
        CylinderType::Standard15Kg,
        CylinderType::Commercial45_4Kg,
    ];

    /// Nominal gas capacity in kilograms
    pub fn nominal_capacity_kg(&self) -> Decimal {
        match self {
            CylinderType::Domestic11_8Kg => dec!(11.8),
            CylinderType::Standard15Kg => dec!(15),
            CylinderType::Commercial45_4Kg => dec!(45.4),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CylinderType::Domestic11_8Kg => "DOMESTIC_11_8KG",
            CylinderType::Standard15Kg => "STANDARD_15KG",
            CylinderType::Commercial45_4Kg => "COMMERCIAL_45_4KG",
        }
    }
}

impl fmt::Display for CylinderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CylinderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "DOMESTIC_11_8KG" => Ok(CylinderType::Domestic11_8Kg),
            "STANDARD_15KG" => Ok(CylinderType::Standard15Kg),
            "COMMERCIAL_45_4KG" => Ok(CylinderType::Commercial45_4Kg),
            other => Err(format!("Unknown cylinder type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CylinderStatus {
    Full,
    Empty,
    WithCustomer,
    Maintenance,
    Retired,
}

impl CylinderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CylinderStatus::Full => "FULL",
            CylinderStatus::Empty => "EMPTY",
            CylinderStatus::WithCustomer => "WITH_CUSTOMER",
            CylinderStatus::Maintenance => "MAINTENANCE",
            CylinderStatus::Retired => "RETIRED",
        }
    }
}

impl FromStr for CylinderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FULL" => Ok(CylinderStatus::Full),
            "EMPTY" => Ok(CylinderStatus::Empty),
            "WITH_CUSTOMER" => Ok(CylinderStatus::WithCustomer),
            "MAINTENANCE" => Ok(CylinderStatus::Maintenance),
            "RETIRED" => Ok(CylinderStatus::Retired),
            other => Err(format!("Unknown cylinder status: {}", other)),
        }
    }
}

/// Where a cylinder physically is
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CylinderLocation {
    StoreReadyForSale,
    StoreReadyForRefill,
    ReturnedFromCustomer,
    Customer { name: String },
    Vehicle { name: String },
    Other(String),
}

const READY_FOR_SALE: &str = "Store - Ready for Sale";
const READY_FOR_REFILL: &str = "Store - Ready for Refill";
const RETURNED_FROM_CUSTOMER: &str = "Returned from Customer";
const CUSTOMER_PREFIX: &str = "Customer: ";
const VEHICLE_PREFIX: &str = "Vehicle: ";

impl CylinderLocation {
    pub fn customer(name: impl Into<String>) -> Self {
        CylinderLocation::Customer { name: name.into() }
    }

    /// Parses a rendered location back into its typed form
    ///
    /// Unknown text is kept verbatim as `Other`.
    pub fn parse(text: &str) -> Self {
        match text {
            READY_FOR_SALE => CylinderLocation::StoreReadyForSale,
            READY_FOR_REFILL => CylinderLocation::StoreReadyForRefill,
            RETURNED_FROM_CUSTOMER => CylinderLocation::ReturnedFromCustomer,
            _ => {
                if let Some(name) = text.strip_prefix(CUSTOMER_PREFIX) {
                    CylinderLocation::customer(name)
                } else if let Some(name) = text.strip_prefix(VEHICLE_PREFIX) {
                    CylinderLocation::Vehicle { name: name.to_string() }
                } else {
                    CylinderLocation::Other(text.to_string())
                }
            }
        }
    }
}

impl fmt::Display for CylinderLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CylinderLocation::StoreReadyForSale => f.write_str(READY_FOR_SALE),
            CylinderLocation::StoreReadyForRefill => f.write_str(READY_FOR_REFILL),
            CylinderLocation::ReturnedFromCustomer => f.write_str(RETURNED_FROM_CUSTOMER),
            CylinderLocation::Customer { name } => write!(f, "{}{}", CUSTOMER_PREFIX, name),
            CylinderLocation::Vehicle { name } => write!(f, "{}{}", VEHICLE_PREFIX, name),
            CylinderLocation::Other(text) => f.write_str(text),
        }
    }
}

impl Serialize for CylinderLocation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CylinderLocation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(CylinderLocation::parse(&text))
    }
}

/// The customer a cylinder is out with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CylinderHolder {
    B2b(CustomerId),
    B2c(RetailCustomerId),
}

/// The B2B or B2C transaction that last sent a cylinder back to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "channel", content = "id", rename_all = "lowercase")]
pub enum TransactionRef {
    B2b(TransactionId),
    B2c(RetailTransactionId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub id: CylinderId,
    pub code: String,
    pub cylinder_type: CylinderType,
    pub capacity_kg: Decimal,
    pub status: CylinderStatus,
    pub location: CylinderLocation,
    pub holder: Option<CylinderHolder>,
    /// The transaction that returned this cylinder, if it came back from a customer
    pub source_transaction: Option<TransactionRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cylinder record to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewCylinder {
    pub code: String,
    pub cylinder_type: CylinderType,
    pub status: CylinderStatus,
    pub location: CylinderLocation,
    pub holder: Option<CylinderHolder>,
    pub source_transaction: Option<TransactionRef>,
}

impl NewCylinder {
    pub fn into_cylinder(self, at: DateTime<Utc>) -> Cylinder {
        Cylinder {
            id: CylinderId::new_v7(),
            code: self.code,
            cylinder_type: self.cylinder_type,
            capacity_kg: self.cylinder_type.nominal_capacity_kg(),
            status: self.status,
            location: self.location,
            holder: self.holder,
            source_transaction: self.source_transaction,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Filter for cylinder lookups; unset fields match anything
///
/// `locations` matches any of the listed locations. Results are returned in
/// creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CylinderQuery {
    pub cylinder_type: Option<CylinderType>,
    pub status: Option<CylinderStatus>,
    pub holder: Option<CylinderHolder>,
    pub locations: Vec<CylinderLocation>,
    pub source_transaction: Option<TransactionRef>,
    pub limit: Option<usize>,
}

impl CylinderQuery {
    pub fn of(cylinder_type: CylinderType, status: CylinderStatus) -> Self {
        Self {
            cylinder_type: Some(cylinder_type),
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn held_by(mut self, holder: CylinderHolder) -> Self {
        self.holder = Some(holder);
        self
    }

    pub fn at(mut self, location: CylinderLocation) -> Self {
        self.locations.push(location);
        self
    }

    pub fn from_transaction(mut self, transaction: TransactionRef) -> Self {
        self.source_transaction = Some(transaction);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, cylinder: &Cylinder) -> bool {
        self.cylinder_type.map_or(true, |t| cylinder.cylinder_type == t)
            && self.status.map_or(true, |s| cylinder.status == s)
            && self.holder.map_or(true, |h| cylinder.holder == Some(h))
            && (self.locations.is_empty() || self.locations.contains(&cylinder.location))
            && self
                .source_transaction
                .map_or(true, |t| cylinder.source_transaction == Some(t))
    }
}

/// New status, location, holder and source applied to a set of cylinders
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderMove {
    pub status: CylinderStatus,
    pub location: CylinderLocation,
    pub holder: Option<CylinderHolder>,
    pub source_transaction: Option<TransactionRef>,
}

impl CylinderMove {
    pub fn to_store_full() -> Self {
        Self {
            status: CylinderStatus::Full,
            location: CylinderLocation::StoreReadyForSale,
            holder: None,
            source_transaction: None,
        }
    }

    pub fn returned_empty(source: TransactionRef) -> Self {
        Self {
            status: CylinderStatus::Empty,
            location: CylinderLocation::ReturnedFromCustomer,
            holder: None,
            source_transaction: Some(source),
        }
    }

    pub fn to_customer(name: &str, holder: CylinderHolder) -> Self {
        Self {
            status: CylinderStatus::WithCustomer,
            location: CylinderLocation::customer(name),
            holder: Some(holder),
            source_transaction: None,
        }
    }

    pub fn apply(&self, cylinder: &mut Cylinder, at: DateTime<Utc>) {
        cylinder.status = self.status;
        cylinder.location = self.location.clone();
        cylinder.holder = self.holder;
        cylinder.source_transaction = self.source_transaction;
        cylinder.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_renders_legacy_strings() {
        assert_eq!(CylinderLocation::StoreReadyForSale.to_string(), "Store - Ready for Sale");
        assert_eq!(CylinderLocation::StoreReadyForRefill.to_string(), "Store - Ready for Refill");
        assert_eq!(CylinderLocation::ReturnedFromCustomer.to_string(), "Returned from Customer");
        assert_eq!(CylinderLocation::customer("Ali Traders").to_string(), "Customer: Ali Traders");
    }

    #[test]
    fn test_location_parse_inverts_display() {
        for location in [
            CylinderLocation::StoreReadyForSale,
            CylinderLocation::StoreReadyForRefill,
            CylinderLocation::ReturnedFromCustomer,
            CylinderLocation::customer("Ali Traders"),
            CylinderLocation::Vehicle { name: "LHR-1234".into() },
            CylinderLocation::Other("Workshop".into()),
        ] {
            assert_eq!(CylinderLocation::parse(&location.to_string()), location);
        }
    }

    #[test]
    fn test_cylinder_type_wire_names() {
        let json = serde_json::to_string(&CylinderType::Domestic11_8Kg).unwrap();
        assert_eq!(json, "\"DOMESTIC_11_8KG\"");
        assert_eq!("COMMERCIAL_45_4KG".parse::<CylinderType>().unwrap(), CylinderType::Commercial45_4Kg);
        assert_eq!(CylinderType::Commercial45_4Kg.nominal_capacity_kg(), dec!(45.4));
    }

    #[test]
    fn test_query_matches_holder_not_location_text() {
        let owner = CustomerId::new();
        let mut cylinder = NewCylinder {
            code: "CYL-1".into(),
            cylinder_type: CylinderType::Standard15Kg,
            status: CylinderStatus::WithCustomer,
            // A name that would confuse substring matching
            location: CylinderLocation::customer("Ali Traders Karachi"),
            holder: Some(CylinderHolder::B2b(owner)),
            source_transaction: None,
        }
        .into_cylinder(Utc::now());

        let query = CylinderQuery::of(CylinderType::Standard15Kg, CylinderStatus::WithCustomer)
            .held_by(CylinderHolder::B2b(owner));
        assert!(query.matches(&cylinder));

        cylinder.holder = Some(CylinderHolder::B2b(CustomerId::new()));
        assert!(!query.matches(&cylinder));
    }
}
