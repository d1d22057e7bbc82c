//! Service-level tests for B2B recording and voiding
//!
//! Every test runs against the in-memory store, through `LedgerService`, the
//! same way the HTTP layer drives it.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{CustomerId, TransactionId};
use domain_ledger::{
    BillNumberFormat, CylinderHolder, CylinderLocation, CylinderStatus, CylinderType, LedgerConfig, LedgerError,
    ReconciliationPolicy, RecordTransaction, TransactionRef, TransactionType,
};
use test_utils::{
    assert_balance, assert_cylinder_count, assert_due, assert_err_variant, assert_money_approx_eq,
    assert_reconciled, init_tracing, pkr, CustomerBuilder, CylinderBuilder, DateFixtures,
    LineFixtures, TestLedger,
};

const DOMESTIC: CylinderType = CylinderType::Domestic11_8Kg;

fn sale(customer_id: CustomerId) -> RecordTransaction {
    RecordTransaction::new(TransactionType::Sale, customer_id, DateFixtures::bill_day())
}

// ============================================================================
// Recording
// ============================================================================

mod recording {
    use super::*;

    #[tokio::test]
    async fn test_sale_with_accessory() {
        init_tracing();
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        let regulator = ledger.seed_product("Regulator", 5).await;

        let request = sale(customer.id)
            .with_time("10:30")
            .with_item(LineFixtures::two_domestic())
            .with_item(LineFixtures::accessory(Some(regulator.id), "Regulator", 1, dec!(1500)));
        let transaction = ledger.service.record(request, &ledger.actor).await.unwrap();

        assert_eq!(transaction.bill_sno, "BILL-202403010001");
        assert_eq!(transaction.total_amount, pkr(dec!(11500)));
        assert_eq!(transaction.balance_effect, pkr(dec!(11500)));
        assert_eq!(transaction.due_effect.domestic_11_8kg, 2);
        assert_eq!(transaction.items.len(), 2);
        assert_eq!(transaction.created_by, ledger.actor);

        let stored = ledger.store.customer(customer.id).await.unwrap();
        assert_balance(&stored, dec!(11500));
        assert_due(&stored, DOMESTIC, 2);
        assert_eq!(ledger.store.product(regulator.id).await.unwrap().stock_quantity, 4);
    }

    #[tokio::test]
    async fn test_accessory_resolved_by_name() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        let regulator = ledger.seed_product("Regulator", 5).await;

        let request = sale(customer.id)
            .with_item(LineFixtures::two_domestic())
            .with_item(LineFixtures::accessory(None, "regulator", 2, dec!(1500)));
        let transaction = ledger.service.record(request, &ledger.actor).await.unwrap();

        let resolved = transaction.items.iter().find_map(|item| match &item.kind {
            domain_ledger::ItemKind::Accessory { product_id, .. } => *product_id,
            _ => None,
        });
        assert_eq!(resolved, Some(regulator.id));
        assert_eq!(ledger.store.product(regulator.id).await.unwrap().stock_quantity, 3);
    }

    #[tokio::test]
    async fn test_insufficient_accessory_stock_writes_nothing() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        let regulator = ledger.seed_product("Regulator", 1).await;

        let request = sale(customer.id)
            .with_item(LineFixtures::two_domestic())
            .with_item(LineFixtures::accessory(Some(regulator.id), "Regulator", 2, dec!(1500)));
        let result = ledger.service.record(request, &ledger.actor).await;

        assert_err_variant!(result, LedgerError::Validation(_));
        let state = ledger.store.snapshot().await;
        assert!(state.transactions.is_empty());
        assert!(state.bill_sequences.is_empty());
        assert_eq!(state.products[&regulator.id].stock_quantity, 1);
        assert_balance(&state.customers[&customer.id], dec!(0));
    }

    #[tokio::test]
    async fn test_partial_payment_at_counter() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;

        let request = sale(customer.id)
            .with_item(LineFixtures::two_domestic())
            .with_amount_paid(pkr(dec!(4000)));
        let transaction = ledger.service.record(request, &ledger.actor).await.unwrap();

        assert_eq!(transaction.unpaid_amount, Some(pkr(dec!(6000))));
        assert_balance(&ledger.store.customer(customer.id).await.unwrap(), dec!(6000));
    }

    #[tokio::test]
    async fn test_sale_with_empties_nets_dues() {
        let ledger = TestLedger::new();
        let customer = ledger
            .add_customer(CustomerBuilder::new().with_due(DOMESTIC, 3).build())
            .await;

        let request = sale(customer.id)
            .with_item(LineFixtures::two_domestic())
            .with_item(LineFixtures::empty_return(DOMESTIC, 2));
        let transaction = ledger.service.record(request, &ledger.actor).await.unwrap();

        assert_eq!(transaction.due_effect.domestic_11_8kg, 0);
        assert_due(&ledger.store.customer(customer.id).await.unwrap(), DOMESTIC, 3);
    }

    #[tokio::test]
    async fn test_payment_leaves_dues_unchanged() {
        let ledger = TestLedger::new();
        let customer = ledger
            .add_customer(
                CustomerBuilder::new()
                    .with_balance(dec!(11500))
                    .with_due(DOMESTIC, 2)
                    .build(),
            )
            .await;

        let request = RecordTransaction::payment(customer.id, pkr(dec!(5000)), DateFixtures::bill_day())
            .with_reference("CHQ-7781");
        let transaction = ledger.service.record(request, &ledger.actor).await.unwrap();

        assert_eq!(transaction.balance_effect, pkr(dec!(-5000)));
        assert!(transaction.due_effect.is_zero());
        assert_eq!(transaction.payment_reference.as_deref(), Some("CHQ-7781"));

        let stored = ledger.store.customer(customer.id).await.unwrap();
        assert_balance(&stored, dec!(6500));
        assert_due(&stored, DOMESTIC, 2);
    }

    #[tokio::test]
    async fn test_return_empty_creates_empty_cylinders() {
        let ledger = TestLedger::new();
        let customer = ledger
            .add_customer(CustomerBuilder::new().with_due(DOMESTIC, 2).build())
            .await;

        let request = RecordTransaction::new(TransactionType::ReturnEmpty, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::empty_return(DOMESTIC, 1));
        let transaction = ledger.service.record(request, &ledger.actor).await.unwrap();

        assert!(transaction.balance_effect.is_zero());
        let stored = ledger.store.customer(customer.id).await.unwrap();
        assert_due(&stored, DOMESTIC, 1);
        assert_balance(&stored, dec!(0));

        let cylinders = ledger.store.cylinders().await;
        assert_eq!(cylinders.len(), 1);
        let returned = &cylinders[0];
        assert_eq!(returned.code, "BILL-202403010001-E01");
        assert_eq!(returned.status, CylinderStatus::Empty);
        assert_eq!(returned.location, CylinderLocation::ReturnedFromCustomer);
        assert_eq!(returned.source_transaction, Some(TransactionRef::B2b(transaction.id)));
        assert!(returned.holder.is_none());
    }

    #[tokio::test]
    async fn test_return_beyond_dues_is_clamped() {
        let ledger = TestLedger::new();
        let customer = ledger
            .add_customer(CustomerBuilder::new().with_due(DOMESTIC, 1).build())
            .await;

        let request = RecordTransaction::new(TransactionType::ReturnEmpty, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::empty_return(DOMESTIC, 3));
        let transaction = ledger.service.record(request, &ledger.actor).await.unwrap();

        assert_eq!(transaction.due_effect.domestic_11_8kg, -1);
        assert_due(&ledger.store.customer(customer.id).await.unwrap(), DOMESTIC, 0);
        // All three physical cylinders still come in
        assert_eq!(ledger.store.cylinders().await.len(), 3);
    }

    #[tokio::test]
    async fn test_buyback_priced_from_remaining_gas() {
        let ledger = TestLedger::new();
        let customer = ledger
            .add_customer(
                CustomerBuilder::new()
                    .with_balance(dec!(2000))
                    .with_due(DOMESTIC, 1)
                    .build(),
            )
            .await;

        let request = RecordTransaction::new(TransactionType::Buyback, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::buyback(DOMESTIC, 1, dec!(5), dec!(5000)));
        let transaction = ledger.service.record(request, &ledger.actor).await.unwrap();

        assert_money_approx_eq(&transaction.total_amount, &pkr(dec!(1271.19)), dec!(0.01));
        assert_eq!(transaction.total_amount.round_to_currency().amount(), dec!(1271.19));

        let stored = ledger.store.customer(customer.id).await.unwrap();
        assert_eq!(stored.ledger_balance, pkr(dec!(2000)) - transaction.total_amount);
        assert_due(&stored, DOMESTIC, 0);
        assert_cylinder_count(
            &ledger.store.cylinders().await,
            DOMESTIC,
            CylinderStatus::Empty,
            &CylinderLocation::ReturnedFromCustomer,
            1,
        );
    }

    #[tokio::test]
    async fn test_credit_note_reduces_balance() {
        let ledger = TestLedger::new();
        let customer = ledger
            .add_customer(CustomerBuilder::new().with_balance(dec!(3000)).build())
            .await;

        let request = RecordTransaction::new(TransactionType::CreditNote, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::charge("Rate difference", dec!(750)));
        ledger.service.record(request, &ledger.actor).await.unwrap();

        assert_balance(&ledger.store.customer(customer.id).await.unwrap(), dec!(2250));
    }

    #[tokio::test]
    async fn test_bill_numbers_restart_each_day() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;

        let first = ledger
            .service
            .record(RecordTransaction::payment(customer.id, pkr(dec!(100)), DateFixtures::bill_day()), &ledger.actor)
            .await
            .unwrap();
        let second = ledger
            .service
            .record(RecordTransaction::payment(customer.id, pkr(dec!(100)), DateFixtures::bill_day()), &ledger.actor)
            .await
            .unwrap();
        let next_day = ledger
            .service
            .record(RecordTransaction::payment(customer.id, pkr(dec!(100)), DateFixtures::next_day()), &ledger.actor)
            .await
            .unwrap();

        assert_eq!(first.bill_sno, "BILL-202403010001");
        assert_eq!(second.bill_sno, "BILL-202403010002");
        assert_eq!(next_day.bill_sno, "BILL-202403020001");
    }

    #[tokio::test]
    async fn test_full_day_refuses_further_bills() {
        let ledger = TestLedger::with_config(LedgerConfig::default().with_bill_format(
            BillNumberFormat::new("BILL-", 1),
            BillNumberFormat::new("B2C-", 1),
        ));
        let customer = ledger.seed_customer().await;
        let payment = |day: &str| RecordTransaction::payment(customer.id, pkr(dec!(100)), day);

        let mut issued = Vec::new();
        for _ in 0..9 {
            let recorded = ledger.service.record(payment(DateFixtures::bill_day()), &ledger.actor).await.unwrap();
            issued.push(recorded.bill_sno);
        }
        let mut sorted = issued.clone();
        sorted.sort();
        assert_eq!(sorted, issued);
        assert_eq!(issued[8], "BILL-202403019");

        let refused = ledger.service.record(payment(DateFixtures::bill_day()), &ledger.actor).await;
        assert_err_variant!(refused, LedgerError::Validation(_));
        assert_balance(&ledger.store.customer(customer.id).await.unwrap(), dec!(-900));

        let next_day = ledger.service.record(payment(DateFixtures::next_day()), &ledger.actor).await.unwrap();
        assert_eq!(next_day.bill_sno, "BILL-202403021");
    }
}

// ============================================================================
// Validation
// ============================================================================

mod validation {
    use super::*;

    async fn assert_rejected(ledger: &TestLedger, request: RecordTransaction) {
        let result = ledger.service.record(request, &ledger.actor).await;
        assert_err_variant!(result, LedgerError::Validation(_));
        let state = ledger.store.snapshot().await;
        assert!(state.transactions.is_empty());
        assert!(state.bill_sequences.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_date_and_time() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;

        let bad_date = RecordTransaction::new(TransactionType::Sale, customer.id, "01/03/2024")
            .with_item(LineFixtures::two_domestic());
        assert_rejected(&ledger, bad_date).await;

        let bad_time = sale(customer.id)
            .with_time("25:99")
            .with_item(LineFixtures::two_domestic());
        assert_rejected(&ledger, bad_time).await;

        let bad_date_with_timestamp = RecordTransaction::new(TransactionType::Sale, customer.id, "garbage")
            .with_time("2024-03-01T10:30:00+05:00")
            .with_item(LineFixtures::two_domestic());
        assert_rejected(&ledger, bad_date_with_timestamp).await;
    }

    #[tokio::test]
    async fn test_non_positive_quantity() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;

        let negative = sale(customer.id).with_item(LineFixtures::cylinders(DOMESTIC, -1, dec!(5000)));
        assert_rejected(&ledger, negative).await;

        let zero = sale(customer.id).with_item(LineFixtures::cylinders(DOMESTIC, 0, dec!(5000)));
        assert_rejected(&ledger, zero).await;
    }

    #[tokio::test]
    async fn test_empty_items() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        assert_rejected(&ledger, sale(customer.id)).await;
    }

    #[tokio::test]
    async fn test_item_kind_not_allowed_for_type() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;

        let payment_on_sale = sale(customer.id).with_item(LineFixtures::payment(dec!(500)));
        assert_rejected(&ledger, payment_on_sale).await;

        let cylinder_on_payment = RecordTransaction::new(TransactionType::Payment, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::two_domestic());
        assert_rejected(&ledger, cylinder_on_payment).await;
    }

    #[tokio::test]
    async fn test_amount_paid_above_total() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;

        let overpaid = sale(customer.id)
            .with_item(LineFixtures::two_domestic())
            .with_amount_paid(pkr(dec!(10001)));
        assert_rejected(&ledger, overpaid).await;
    }

    #[tokio::test]
    async fn test_buyback_with_more_gas_than_capacity() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;

        let request = RecordTransaction::new(TransactionType::Buyback, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::buyback(DOMESTIC, 1, dec!(12), dec!(5000)));
        assert_rejected(&ledger, request).await;
    }

    #[tokio::test]
    async fn test_unknown_customer_writes_nothing() {
        let ledger = TestLedger::new();
        let request = sale(CustomerId::new()).with_item(LineFixtures::two_domestic());

        let result = ledger.service.record(request, &ledger.actor).await;

        assert_err_variant!(result, LedgerError::NotFound { .. });
        let state = ledger.store.snapshot().await;
        assert!(state.transactions.is_empty());
        assert!(state.bill_sequences.is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        let regulator = ledger.seed_product("Regulator", 5).await;
        ledger.store.fail_next_commit();

        let request = sale(customer.id)
            .with_item(LineFixtures::two_domestic())
            .with_item(LineFixtures::accessory(Some(regulator.id), "Regulator", 1, dec!(1500)));
        let result = ledger.service.record(request, &ledger.actor).await;

        assert_err_variant!(result, LedgerError::Store(_));
        let state = ledger.store.snapshot().await;
        assert!(state.transactions.is_empty());
        assert!(state.bill_sequences.is_empty());
        assert_eq!(state.products[&regulator.id].stock_quantity, 5);
        assert_balance(&state.customers[&customer.id], dec!(0));
        assert_due(&state.customers[&customer.id], DOMESTIC, 0);
    }
}

// ============================================================================
// Voiding
// ============================================================================

mod voiding {
    use super::*;

    #[tokio::test]
    async fn test_void_sale_restores_balance_dues_and_stock() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        let regulator = ledger.seed_product("Regulator", 5).await;

        let request = sale(customer.id)
            .with_item(LineFixtures::two_domestic())
            .with_item(LineFixtures::accessory(Some(regulator.id), "Regulator", 1, dec!(1500)));
        let recorded = ledger.service.record(request, &ledger.actor).await.unwrap();

        let outcome = ledger
            .service
            .reverse(recorded.id, Some("Entered twice".to_string()), &ledger.actor)
            .await
            .unwrap();

        let void = outcome.transaction.void.as_ref().unwrap();
        assert_eq!(void.reason, "Entered twice");
        assert_eq!(void.voided_by, ledger.actor);
        // B2B sales hand out no tracked cylinders, so there is nothing to recall
        assert!(outcome.warnings.is_empty());

        let state = ledger.store.snapshot().await;
        assert_balance(&state.customers[&customer.id], dec!(0));
        assert_due(&state.customers[&customer.id], DOMESTIC, 0);
        assert_eq!(state.products[&regulator.id].stock_quantity, 5);
        assert!(state.transactions[&recorded.id].is_voided());
    }

    #[tokio::test]
    async fn test_void_sale_restocks_held_cylinders() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        for _ in 0..2 {
            ledger
                .add_cylinder(
                    CylinderBuilder::new()
                        .held_by(CylinderHolder::B2b(customer.id), &customer.name)
                        .build(),
                )
                .await;
        }

        let recorded = ledger
            .service
            .record(sale(customer.id).with_item(LineFixtures::two_domestic()), &ledger.actor)
            .await
            .unwrap();
        let outcome = ledger.service.reverse(recorded.id, None, &ledger.actor).await.unwrap();

        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.transaction.void.unwrap().reason, "Transaction voided");
        let cylinders = ledger.store.cylinders().await;
        assert_cylinder_count(&cylinders, DOMESTIC, CylinderStatus::Full, &CylinderLocation::StoreReadyForSale, 2);
        assert!(cylinders.iter().all(|c| c.holder.is_none()));
    }

    #[tokio::test]
    async fn test_void_return_sends_cylinders_back_out() {
        let ledger = TestLedger::new();
        let customer = ledger
            .add_customer(CustomerBuilder::new().with_due(DOMESTIC, 2).build())
            .await;

        let request = RecordTransaction::new(TransactionType::ReturnEmpty, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::empty_return(DOMESTIC, 1));
        let recorded = ledger.service.record(request, &ledger.actor).await.unwrap();
        let outcome = ledger.service.reverse(recorded.id, None, &ledger.actor).await.unwrap();

        assert!(outcome.warnings.is_empty());
        assert_due(&ledger.store.customer(customer.id).await.unwrap(), DOMESTIC, 2);
        let cylinders = ledger.store.cylinders().await;
        assert_cylinder_count(
            &cylinders,
            DOMESTIC,
            CylinderStatus::WithCustomer,
            &CylinderLocation::customer(customer.name.clone()),
            1,
        );
        assert_eq!(cylinders[0].holder, Some(CylinderHolder::B2b(customer.id)));
    }

    #[tokio::test]
    async fn test_void_clamped_return_restores_exact_dues() {
        let ledger = TestLedger::new();
        let customer = ledger
            .add_customer(CustomerBuilder::new().with_due(DOMESTIC, 1).build())
            .await;

        let request = RecordTransaction::new(TransactionType::ReturnEmpty, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::empty_return(DOMESTIC, 3));
        let recorded = ledger.service.record(request, &ledger.actor).await.unwrap();
        ledger.service.reverse(recorded.id, None, &ledger.actor).await.unwrap();

        assert_due(&ledger.store.customer(customer.id).await.unwrap(), DOMESTIC, 1);
    }

    #[tokio::test]
    async fn test_second_void_is_rejected() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        let recorded = ledger
            .service
            .record(RecordTransaction::payment(customer.id, pkr(dec!(900)), DateFixtures::bill_day()), &ledger.actor)
            .await
            .unwrap();
        ledger.service.reverse(recorded.id, None, &ledger.actor).await.unwrap();
        let after_first = ledger.store.snapshot().await;

        let second = ledger.service.reverse(recorded.id, None, &ledger.actor).await;

        match second {
            Err(LedgerError::AlreadyVoided(bill_sno)) => assert_eq!(bill_sno, recorded.bill_sno),
            other => panic!("Expected AlreadyVoided, got {:?}", other),
        }
        let after_second = ledger.store.snapshot().await;
        assert_eq!(after_first.customers, after_second.customers);
        assert_eq!(after_first.transactions, after_second.transactions);
    }

    #[tokio::test]
    async fn test_unknown_transaction() {
        let ledger = TestLedger::new();
        let result = ledger.service.reverse(TransactionId::new(), None, &ledger.actor).await;
        assert_err_variant!(result, LedgerError::NotFound { .. });
    }

    #[tokio::test]
    async fn test_strict_policy_voids_sale_with_stock_in_store() {
        let ledger = TestLedger::with_config(
            LedgerConfig::default().with_reconciliation(ReconciliationPolicy::Strict),
        );
        let customer = ledger.seed_customer().await;
        for _ in 0..5 {
            ledger.add_cylinder(CylinderBuilder::new().build()).await;
        }
        let recorded = ledger
            .service
            .record(sale(customer.id).with_item(LineFixtures::two_domestic()), &ledger.actor)
            .await
            .unwrap();

        let outcome = ledger.service.reverse(recorded.id, None, &ledger.actor).await.unwrap();

        assert!(outcome.warnings.is_empty());
        let state = ledger.store.snapshot().await;
        assert!(state.transactions[&recorded.id].is_voided());
        assert_balance(&state.customers[&customer.id], dec!(0));
        assert_due(&state.customers[&customer.id], DOMESTIC, 0);
        assert_cylinder_count(&state.cylinders, DOMESTIC, CylinderStatus::Full, &CylinderLocation::StoreReadyForSale, 5);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_void_when_returned_empties_are_gone() {
        let ledger = TestLedger::with_config(
            LedgerConfig::default().with_reconciliation(ReconciliationPolicy::Strict),
        );
        let customer = ledger
            .add_customer(CustomerBuilder::new().with_due(DOMESTIC, 2).build())
            .await;
        let request = RecordTransaction::new(TransactionType::ReturnEmpty, customer.id, DateFixtures::bill_day())
            .with_item(LineFixtures::empty_return(DOMESTIC, 2));
        let recorded = ledger.service.record(request, &ledger.actor).await.unwrap();
        ledger
            .store
            .retain_cylinders(|c| c.status != CylinderStatus::Empty)
            .await;

        let result = ledger.service.reverse(recorded.id, None, &ledger.actor).await;

        match result {
            Err(LedgerError::InventoryReconciliation(warnings)) => {
                assert_eq!(warnings.len(), 1);
                assert_eq!((warnings[0].expected, warnings[0].found), (2, 0));
            }
            other => panic!("Expected InventoryReconciliation, got {:?}", other),
        }
        let state = ledger.store.snapshot().await;
        assert!(!state.transactions[&recorded.id].is_voided());
        assert_due(&state.customers[&customer.id], DOMESTIC, 0);
    }

    #[tokio::test]
    async fn test_voided_entries_stay_in_history() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        let kept = ledger
            .service
            .record(sale(customer.id).with_item(LineFixtures::two_domestic()), &ledger.actor)
            .await
            .unwrap();
        let voided = ledger
            .service
            .record(RecordTransaction::payment(customer.id, pkr(dec!(2500)), DateFixtures::bill_day()), &ledger.actor)
            .await
            .unwrap();
        ledger.service.reverse(voided.id, None, &ledger.actor).await.unwrap();

        let history = ledger.service.customer_ledger(customer.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, kept.id);
        assert!(history[1].is_voided());

        let reconciliation = ledger.service.reconcile_customer(customer.id).await.unwrap();
        assert_reconciled(&reconciliation);
        assert_eq!(reconciliation.projected.voided, 1);
        assert_eq!(reconciliation.projected.balance, pkr(dec!(10000)));
    }
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_voids_succeed_once() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;
        let recorded = ledger
            .service
            .record(RecordTransaction::payment(customer.id, pkr(dec!(1000)), DateFixtures::bill_day()), &ledger.actor)
            .await
            .unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&ledger.service);
                let actor = ledger.actor.clone();
                tokio::spawn(async move { service.reverse(recorded.id, None, &actor).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut already_voided = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::AlreadyVoided(_)) => already_voided += 1,
                Err(other) => panic!("Unexpected error: {:?}", other),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(already_voided, 1);
        assert_balance(&ledger.store.customer(customer.id).await.unwrap(), dec!(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_get_distinct_bill_numbers() {
        let ledger = TestLedger::new();
        let customer = ledger.seed_customer().await;

        let handles: Vec<_> = (0..1000)
            .map(|_| {
                let service = Arc::clone(&ledger.service);
                let actor = ledger.actor.clone();
                let request = RecordTransaction::payment(customer.id, pkr(dec!(1)), DateFixtures::bill_day());
                tokio::spawn(async move { service.record(request, &actor).await })
            })
            .collect();

        let mut bills = HashSet::new();
        for handle in handles {
            bills.insert(handle.await.unwrap().unwrap().bill_sno);
        }

        let expected: HashSet<String> = (1..=1000).map(|n| format!("BILL-20240301{:04}", n)).collect();
        assert_eq!(bills, expected);
        assert_balance(&ledger.store.customer(customer.id).await.unwrap(), dec!(-1000));
    }
}

// ============================================================================
// Properties
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;
    use test_utils::{cylinder_type_strategy, record_transaction_strategy, transaction_history_strategy};

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn fixed_customer() -> CustomerId {
        CustomerId::from_uuid(uuid::Uuid::nil())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn history_reconciles_with_cache(history in transaction_history_strategy(fixed_customer(), 8)) {
            block_on(async {
                let ledger = TestLedger::new();
                ledger.add_customer(CustomerBuilder::new().with_id(fixed_customer()).build()).await;
                for request in history {
                    ledger.service.record(request, &ledger.actor).await.unwrap();
                }
                let reconciliation = ledger.service.reconcile_customer(fixed_customer()).await.unwrap();
                assert_reconciled(&reconciliation);
            });
        }

        #[test]
        fn reversal_is_an_exact_inverse(
            request in record_transaction_strategy(fixed_customer()),
            opening_balance in -50_000i64..50_000i64,
            due_type in cylinder_type_strategy(),
            opening_due in 0u32..5u32,
        ) {
            block_on(async {
                let ledger = TestLedger::new();
                let opening = ledger
                    .add_customer(
                        CustomerBuilder::new()
                            .with_id(fixed_customer())
                            .with_balance(Decimal::from(opening_balance))
                            .with_due(due_type, opening_due)
                            .build(),
                    )
                    .await;

                let recorded = ledger.service.record(request, &ledger.actor).await.unwrap();
                ledger.service.reverse(recorded.id, None, &ledger.actor).await.unwrap();

                let restored = ledger.store.customer(fixed_customer()).await.unwrap();
                assert_eq!(restored.ledger_balance, opening.ledger_balance);
                assert_eq!(restored.dues, opening.dues);
            });
        }

        #[test]
        fn voiding_everything_returns_to_zero(history in transaction_history_strategy(fixed_customer(), 6)) {
            block_on(async {
                let ledger = TestLedger::new();
                ledger.add_customer(CustomerBuilder::new().with_id(fixed_customer()).build()).await;
                let mut recorded = Vec::new();
                for request in history {
                    recorded.push(ledger.service.record(request, &ledger.actor).await.unwrap());
                }
                for transaction in recorded.iter().rev() {
                    ledger.service.reverse(transaction.id, None, &ledger.actor).await.unwrap();
                    let reconciliation = ledger.service.reconcile_customer(fixed_customer()).await.unwrap();
                    assert_reconciled(&reconciliation);
                }

                let customer = ledger.store.customer(fixed_customer()).await.unwrap();
                assert!(customer.ledger_balance.is_zero());
                assert_eq!(customer.dues.total(), 0);
            });
        }
    }
}
