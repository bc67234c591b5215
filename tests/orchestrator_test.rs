mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use common::{amount, orchestrator_with, test_config, MockGateway};
use scanpay_server::gateway::{GatewayStatus, PollOutcome};
use scanpay_server::models::{PaymentMethod, TransactionStatus};
use scanpay_server::services::PaymentRequest;
use scanpay_server::store::{InMemoryPaymentStore, PaymentStore};
use scanpay_server::utils::error::AppError;

fn request(raw_amount: &str) -> PaymentRequest {
    PaymentRequest {
        client_id: Uuid::new_v4(),
        merchant_id: Uuid::new_v4(),
        amount: amount(raw_amount),
        payment_method: PaymentMethod::MtnMoney,
        description: Some("test payment".to_string()),
    }
}

#[tokio::test]
async fn successful_payment_settles_and_debits_ledger() {
    let reference = Uuid::new_v4();
    let gateway = Arc::new(MockGateway::successful().with_reference(reference));
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway.clone(), store.clone(), test_config());

    let outcome = orchestrator.process_payment(request("50.00")).await.unwrap();

    assert_eq!(outcome.status, TransactionStatus::Completed);
    assert_eq!(outcome.gateway_ref, reference);
    assert!(outcome.transaction.reference_number.starts_with("TX-"));

    let persisted = store
        .get_transaction(outcome.transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.status, TransactionStatus::Completed);
    assert_eq!(persisted.gateway_ref, Some(reference));

    let entries = store.list_ledger_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].transaction_id, Some(outcome.transaction.id));
    assert_eq!(entries[0].debit, amount("50.00"));
    assert_eq!(entries[0].credit, amount("0"));
    assert_eq!(entries[0].balance, amount("50.00"));
}

#[tokio::test]
async fn token_failure_persists_nothing() {
    let gateway = Arc::new(MockGateway::failing_token());
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway, store.clone(), test_config());

    let err = orchestrator
        .process_payment(request("50.00"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AccessTokenError(_)));
    assert!(store.list_transactions().await.unwrap().is_empty());
    assert!(store.list_ledger_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn initiation_failure_persists_nothing() {
    let gateway = Arc::new(MockGateway::failing_initiate());
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway, store.clone(), test_config());

    let err = orchestrator
        .process_payment(request("50.00"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::GatewayRequestError(_)));
    assert!(store.list_transactions().await.unwrap().is_empty());
    assert!(store.list_ledger_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn provider_rejection_maps_to_failed_with_reversal_credit() {
    let gateway = Arc::new(MockGateway::with_polls(
        vec![PollOutcome::Rejected {
            reason: "PAYER_LIMIT_REACHED".to_string(),
            message: "insufficient funds".to_string(),
        }],
        PollOutcome::Status(GatewayStatus::Pending),
    ));
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway, store.clone(), test_config());

    let outcome = orchestrator.process_payment(request("50.00")).await.unwrap();

    assert_eq!(outcome.status, TransactionStatus::Failed);
    let entries = store.list_ledger_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].debit, amount("0"));
    assert_eq!(entries[0].credit, amount("50.00"));
}

#[tokio::test]
async fn gateway_failed_status_maps_to_failed() {
    let gateway = Arc::new(MockGateway::with_polls(
        vec![PollOutcome::Status(GatewayStatus::Failed)],
        PollOutcome::Status(GatewayStatus::Pending),
    ));
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway, store.clone(), test_config());

    let outcome = orchestrator.process_payment(request("25.00")).await.unwrap();
    assert_eq!(outcome.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn pending_after_poll_budget_keeps_row_without_entry() {
    let gateway = Arc::new(MockGateway::with_polls(
        Vec::new(),
        PollOutcome::Status(GatewayStatus::Pending),
    ));
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway, store.clone(), test_config());

    let outcome = orchestrator.process_payment(request("10.00")).await.unwrap();

    assert_eq!(outcome.status, TransactionStatus::Pending);
    let persisted = store
        .get_transaction(outcome.transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.status, TransactionStatus::Pending);
    assert!(store.list_ledger_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn pending_then_successful_settles_within_budget() {
    let gateway = Arc::new(MockGateway::with_polls(
        vec![
            PollOutcome::Status(GatewayStatus::Pending),
            PollOutcome::Status(GatewayStatus::Successful),
        ],
        PollOutcome::Status(GatewayStatus::Pending),
    ));
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway, store.clone(), test_config());

    let outcome = orchestrator.process_payment(request("10.00")).await.unwrap();
    assert_eq!(outcome.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn idempotency_references_are_never_reused() {
    let gateway = Arc::new(MockGateway::successful());
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway.clone(), store, test_config());

    for _ in 0..100 {
        orchestrator.process_payment(request("1.00")).await.unwrap();
    }

    let issued = gateway.issued_references.lock().await.clone();
    assert_eq!(issued.len(), 100);
    let unique: HashSet<_> = issued.iter().collect();
    assert_eq!(unique.len(), 100);
}

#[tokio::test]
async fn credentials_are_provisioned_once_across_runs() {
    let gateway = Arc::new(MockGateway::successful());
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway.clone(), store, test_config());

    for _ in 0..3 {
        orchestrator.process_payment(request("1.00")).await.unwrap();
    }

    assert_eq!(gateway.provision_calls.load(Ordering::SeqCst), 1);
    // One token covers all three runs; it is nowhere near expiry.
    assert_eq!(gateway.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn token_rejected_during_polling_is_not_reused_by_the_next_run() {
    let gateway = Arc::new(MockGateway::rejecting_token_on_poll());
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway.clone(), store.clone(), test_config());

    for _ in 0..2 {
        let err = orchestrator
            .process_payment(request("10.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccessTokenError(_)));
    }

    // The rejection invalidates the cached token, so the second run must
    // fetch a fresh one instead of replaying the rejected token.
    assert_eq!(gateway.token_calls.load(Ordering::SeqCst), 2);
    assert!(store.list_transactions().await.unwrap().is_empty());
    assert!(store.list_ledger_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn deadline_aborts_run_and_persists_nothing() {
    let gateway = Arc::new(MockGateway::with_polls(
        Vec::new(),
        PollOutcome::Status(GatewayStatus::Pending),
    ));
    let store = Arc::new(InMemoryPaymentStore::new());
    let mut config = test_config();
    config.poll_attempts = 100;
    config.poll_delay = Duration::from_millis(50);
    config.deadline = Duration::from_millis(20);
    let orchestrator = orchestrator_with(gateway, store.clone(), config);

    let err = orchestrator
        .process_payment(request("10.00"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DeadlineExceeded));
    assert!(store.list_transactions().await.unwrap().is_empty());
}

#[tokio::test]
async fn mixed_settlements_keep_prefix_sum_balance() {
    let gateway = Arc::new(MockGateway::with_polls(
        vec![
            PollOutcome::Status(GatewayStatus::Successful),
            PollOutcome::Status(GatewayStatus::Failed),
            PollOutcome::Status(GatewayStatus::Successful),
        ],
        PollOutcome::Status(GatewayStatus::Successful),
    ));
    let store = Arc::new(InMemoryPaymentStore::new());
    let orchestrator = orchestrator_with(gateway, store.clone(), test_config());

    orchestrator.process_payment(request("50.00")).await.unwrap();
    orchestrator.process_payment(request("20.00")).await.unwrap();
    orchestrator.process_payment(request("5.00")).await.unwrap();

    let entries = store.list_ledger_entries().await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].balance, amount("50.00"));
    assert_eq!(entries[1].balance, amount("30.00"));
    assert_eq!(entries[2].balance, amount("35.00"));

    let mut running = amount("0");
    for entry in &entries {
        running += entry.debit - entry.credit;
        assert_eq!(entry.balance, running);
    }
}
