//! Tests for strongly-typed identifiers

use core_kernel::{ActorId, CustomerId, CylinderId, RetailTransactionId, TransactionId};
use uuid::Uuid;

#[test]
fn test_prefixes_are_distinct_per_type() {
    assert!(CustomerId::new().to_string().starts_with("CUS-"));
    assert!(TransactionId::new().to_string().starts_with("TXN-"));
    assert!(RetailTransactionId::new().to_string().starts_with("RTXN-"));
    assert!(CylinderId::new().to_string().starts_with("CYL-"));
}

#[test]
fn test_parse_accepts_bare_uuid() {
    let uuid = Uuid::new_v4();
    let id: TransactionId = uuid.to_string().parse().unwrap();
    assert_eq!(*id.as_uuid(), uuid);
}

#[test]
fn test_parse_rejects_garbage() {
    assert!("TXN-not-a-uuid".parse::<TransactionId>().is_err());
}

#[test]
fn test_v7_ids_are_time_ordered() {
    let first = TransactionId::new_v7();
    let second = TransactionId::new_v7();
    assert!(first.as_uuid() <= second.as_uuid());
}

#[test]
fn test_serde_is_transparent() {
    let id = CustomerId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.as_uuid()));

    let actor = ActorId::new("clerk-7");
    assert_eq!(serde_json::to_string(&actor).unwrap(), "\"clerk-7\"");
}
