mod common;

use chrono::{Duration, Utc};
use common::*;
use kidcare_backend::entities::{
    BillingCycle, TransactionStatus, UserRole, payment_transaction_entity as pt,
};
use kidcare_backend::error::AppError;
use kidcare_backend::services::TransactionLedgerService;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};

#[tokio::test]
async fn test_identical_purchase_within_window_reuses_transaction() {
    let db = setup_db().await;
    let svc = build_services(&db, FakeGateway::new());
    let user = seed_user(&db, "a@example.com", UserRole::Member).await;
    let package = seed_package(&db, "Premium", 2000, 20_000, 30).await;

    let quote = svc
        .proration
        .compute_order(user.id, package.id, BillingCycle::Monthly)
        .await
        .unwrap();
    let first = svc.ledger.begin_purchase(user.id, &quote).await.unwrap();
    assert!(!first.existing);
    assert_eq!(first.transaction.status, TransactionStatus::Pending);
    assert!(first.transaction.external_payment_id.is_none());

    svc.ledger
        .attach_external_payment(first.transaction.id, "PAY-1", "https://paypal.test/approve/PAY-1")
        .await
        .unwrap();

    let second = svc.ledger.begin_purchase(user.id, &quote).await.unwrap();
    assert!(second.existing);
    assert_eq!(second.transaction.id, first.transaction.id);
    assert_eq!(
        second.transaction.approval_link.as_deref(),
        Some("https://paypal.test/approve/PAY-1")
    );

    let rows = pt::Entity::find().all(&db).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_different_package_while_pending_conflicts() {
    let db = setup_db().await;
    let svc = build_services(&db, FakeGateway::new());
    let user = seed_user(&db, "a@example.com", UserRole::Member).await;
    let basic = seed_package(&db, "Basic", 1000, 10_000, 30).await;
    let premium = seed_package(&db, "Premium", 2000, 20_000, 30).await;

    let quote = svc
        .proration
        .compute_order(user.id, basic.id, BillingCycle::Monthly)
        .await
        .unwrap();
    svc.ledger.begin_purchase(user.id, &quote).await.unwrap();

    let other = svc
        .proration
        .compute_order(user.id, premium.id, BillingCycle::Monthly)
        .await
        .unwrap();
    let err = svc.ledger.begin_purchase(user.id, &other).await.unwrap_err();
    assert!(matches!(err, AppError::PendingTransactionExists(_)));

    // same package but another billing cycle is a different price
    let yearly = svc
        .proration
        .compute_order(user.id, basic.id, BillingCycle::Yearly)
        .await
        .unwrap();
    let err = svc.ledger.begin_purchase(user.id, &yearly).await.unwrap_err();
    assert!(matches!(err, AppError::PendingTransactionExists(_)));
}

#[tokio::test]
async fn test_stale_pending_does_not_block_and_is_listed() {
    let db = setup_db().await;
    let svc = build_services(&db, FakeGateway::new());
    let user = seed_user(&db, "a@example.com", UserRole::Member).await;
    let basic = seed_package(&db, "Basic", 1000, 10_000, 30).await;
    let premium = seed_package(&db, "Premium", 2000, 20_000, 30).await;

    let quote = svc
        .proration
        .compute_order(user.id, basic.id, BillingCycle::Monthly)
        .await
        .unwrap();
    let old = svc.ledger.begin_purchase(user.id, &quote).await.unwrap();
    let mut am = old.transaction.clone().into_active_model();
    am.transaction_date = Set(Utc::now() - Duration::hours(25));
    am.update(&db).await.unwrap();

    let other = svc
        .proration
        .compute_order(user.id, premium.id, BillingCycle::Monthly)
        .await
        .unwrap();
    let fresh = svc.ledger.begin_purchase(user.id, &other).await.unwrap();
    assert!(!fresh.existing);
    assert_ne!(fresh.transaction.id, old.transaction.id);

    let stale = svc.ledger.list_stale(Utc::now()).await.unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, old.transaction.id);

    // stale rows are reported, never failed automatically
    let reloaded = svc.ledger.find_by_id(old.transaction.id).await.unwrap();
    assert_eq!(reloaded.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_mark_success_fails_closed_on_second_call() {
    let db = setup_db().await;
    let svc = build_services(&db, FakeGateway::new());
    let user = seed_user(&db, "a@example.com", UserRole::Member).await;
    let package = seed_package(&db, "Premium", 2000, 20_000, 30).await;

    let quote = svc
        .proration
        .compute_order(user.id, package.id, BillingCycle::Monthly)
        .await
        .unwrap();
    let handle = svc.ledger.begin_purchase(user.id, &quote).await.unwrap();
    svc.ledger
        .attach_external_payment(handle.transaction.id, "PAY-9", "https://paypal.test/approve/PAY-9")
        .await
        .unwrap();

    let settled = TransactionLedgerService::mark_success(&db, "PAY-9").await.unwrap();
    assert_eq!(settled.status, TransactionStatus::Success);

    let err = TransactionLedgerService::mark_success(&db, "PAY-9")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)));

    let err = TransactionLedgerService::mark_success(&db, "PAY-unknown")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_attach_external_payment_is_idempotent() {
    let db = setup_db().await;
    let svc = build_services(&db, FakeGateway::new());
    let user = seed_user(&db, "a@example.com", UserRole::Member).await;
    let package = seed_package(&db, "Premium", 2000, 20_000, 30).await;

    let quote = svc
        .proration
        .compute_order(user.id, package.id, BillingCycle::Monthly)
        .await
        .unwrap();
    let handle = svc.ledger.begin_purchase(user.id, &quote).await.unwrap();
    let id = handle.transaction.id;

    let first = svc
        .ledger
        .attach_external_payment(id, "PAY-3", "https://paypal.test/approve/PAY-3")
        .await
        .unwrap();
    let again = svc
        .ledger
        .attach_external_payment(id, "PAY-3", "https://paypal.test/approve/PAY-3")
        .await
        .unwrap();
    assert_eq!(first, again);

    let err = svc
        .ledger
        .attach_external_payment(id, "PAY-4", "https://paypal.test/approve/PAY-4")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_failed_transaction_frees_the_account() {
    let db = setup_db().await;
    let svc = build_services(&db, FakeGateway::new());
    let user = seed_user(&db, "a@example.com", UserRole::Member).await;
    let basic = seed_package(&db, "Basic", 1000, 10_000, 30).await;
    let premium = seed_package(&db, "Premium", 2000, 20_000, 30).await;

    let quote = svc
        .proration
        .compute_order(user.id, basic.id, BillingCycle::Monthly)
        .await
        .unwrap();
    let handle = svc.ledger.begin_purchase(user.id, &quote).await.unwrap();
    let failed = svc.ledger.mark_failed(handle.transaction.id).await.unwrap();
    assert_eq!(failed.status, TransactionStatus::Failed);

    let other = svc
        .proration
        .compute_order(user.id, premium.id, BillingCycle::Monthly)
        .await
        .unwrap();
    assert!(svc.ledger.begin_purchase(user.id, &other).await.is_ok());
}
