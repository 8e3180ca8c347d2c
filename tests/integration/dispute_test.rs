//! Dispute resolution transaction.

use chrono::{Duration, Utc};
use uuid::Uuid;

use upkeep_core::error::ErrorKind;
use upkeep_database::repositories::DisputeRepository;
use upkeep_entity::booking::BookingStatus;
use upkeep_entity::dispute::{DisputeOutcome, DisputeStatus, Resolution};
use upkeep_worker::disputes::DisputeResolver;

use crate::helpers::TestDb;

fn resolution(outcome: DisputeOutcome, refund: Option<i64>) -> Resolution {
    Resolution {
        outcome,
        refund_amount_cents: refund,
        note: Some("reviewed photos".to_string()),
        resolved_by: Some(Uuid::new_v4()),
    }
}

async fn disputed_booking(db: &TestDb, amount_cents: i64) -> (Uuid, Uuid) {
    let booking = db
        .insert_booking(BookingStatus::Disputed, amount_cents, Utc::now() - Duration::days(3))
        .await;
    let dispute = db.insert_dispute(booking, &["https://cdn.example.com/evidence/1.jpg"]).await;
    (booking, dispute)
}

#[tokio::test]
async fn test_partial_refund_updates_both_rows() {
    let Some(db) = TestDb::connect().await else { return };
    let (booking_id, dispute_id) = disputed_booking(&db, 10_000).await;
    let resolver = DisputeResolver::new(DisputeRepository::new(db.pool.clone()));

    let resolved = resolver
        .resolve(dispute_id, resolution(DisputeOutcome::PartialRefund, Some(2_500)))
        .await
        .expect("resolve");

    assert_eq!(resolved.dispute.status, DisputeStatus::Resolved);
    assert_eq!(resolved.dispute.outcome, Some(DisputeOutcome::PartialRefund));
    assert_eq!(resolved.dispute.refund_amount_cents, Some(2_500));
    assert!(resolved.dispute.resolved_at.is_some());
    assert_eq!(resolved.booking.id, booking_id);
    assert_eq!(resolved.booking.status, BookingStatus::PartiallyRefunded);
    assert_eq!(db.booking_status(booking_id).await, BookingStatus::PartiallyRefunded);
}

#[tokio::test]
async fn test_dismissal_rejects_dispute_and_completes_booking() {
    let Some(db) = TestDb::connect().await else { return };
    let (booking_id, dispute_id) = disputed_booking(&db, 4_000).await;
    let resolver = DisputeResolver::new(DisputeRepository::new(db.pool.clone()));

    let resolved = resolver
        .resolve(dispute_id, resolution(DisputeOutcome::Dismissed, None))
        .await
        .expect("resolve");
    assert_eq!(resolved.dispute.status, DisputeStatus::Rejected);
    assert_eq!(db.booking_status(booking_id).await, BookingStatus::Completed);
}

#[tokio::test]
async fn test_second_resolution_conflicts() {
    let Some(db) = TestDb::connect().await else { return };
    let (booking_id, dispute_id) = disputed_booking(&db, 4_000).await;
    let resolver = DisputeResolver::new(DisputeRepository::new(db.pool.clone()));

    resolver
        .resolve(dispute_id, resolution(DisputeOutcome::RefundClient, None))
        .await
        .expect("first resolve");
    let err = resolver
        .resolve(dispute_id, resolution(DisputeOutcome::ReleaseToProvider, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(db.booking_status(booking_id).await, BookingStatus::Refunded);
}

#[tokio::test]
async fn test_refund_not_below_amount_writes_nothing() {
    let Some(db) = TestDb::connect().await else { return };
    let (booking_id, dispute_id) = disputed_booking(&db, 3_000).await;
    let repo = DisputeRepository::new(db.pool.clone());
    let resolver = DisputeResolver::new(repo.clone());

    let err = resolver
        .resolve(dispute_id, resolution(DisputeOutcome::PartialRefund, Some(3_000)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let dispute = repo.find_by_id(dispute_id).await.expect("find").expect("exists");
    assert_eq!(dispute.status, DisputeStatus::Open);
    assert_eq!(db.booking_status(booking_id).await, BookingStatus::Disputed);
}

#[tokio::test]
async fn test_unknown_dispute_is_not_found() {
    let Some(db) = TestDb::connect().await else { return };
    let resolver = DisputeResolver::new(DisputeRepository::new(db.pool.clone()));
    let err = resolver
        .resolve(Uuid::new_v4(), resolution(DisputeOutcome::RefundClient, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_resolutions_apply_once() {
    let Some(db) = TestDb::connect().await else { return };
    let (_, dispute_id) = disputed_booking(&db, 8_000).await;
    let resolver = DisputeResolver::new(DisputeRepository::new(db.pool.clone()));

    let (a, b) = tokio::join!(
        resolver.resolve(dispute_id, resolution(DisputeOutcome::RefundClient, None)),
        resolver.resolve(dispute_id, resolution(DisputeOutcome::ReleaseToProvider, None)),
    );
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind == ErrorKind::Conflict)
    );
}
