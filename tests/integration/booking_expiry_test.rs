//! Pending booking expiry against PostgreSQL `SKIP LOCKED` claims.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use upkeep_core::traits::sweep::ExpirySweepStore;
use upkeep_database::repositories::BookingRepository;
use upkeep_entity::booking::BookingStatus;
use upkeep_worker::JobContext;
use upkeep_worker::jobs::{BOOKING_EXPIRY, BookingExpiryJob};

use crate::helpers::TestDb;

/// Claim batches until nothing due is left, collecting transitioned ids.
async fn drain(repo: BookingRepository) -> Vec<Uuid> {
    let mut transitioned = Vec::new();
    loop {
        let batch = repo
            .expire_due_batch(Utc::now(), 7, &[])
            .await
            .expect("batch");
        transitioned.extend(batch.transitioned);
        if batch.claimed == 0 {
            return transitioned;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_transition_each_row_once() {
    let Some(db) = TestDb::connect().await else { return };
    let past = Utc::now() - Duration::minutes(10);
    let mut due = HashSet::new();
    for _ in 0..60 {
        due.insert(db.insert_booking(BookingStatus::Pending, 5_000, past).await);
    }

    let a = tokio::spawn(drain(BookingRepository::new(db.pool.clone())));
    let b = tokio::spawn(drain(BookingRepository::new(db.pool.clone())));
    let (a, b) = (a.await.expect("join a"), b.await.expect("join b"));

    let seen_a: HashSet<Uuid> = a.iter().copied().collect();
    let seen_b: HashSet<Uuid> = b.iter().copied().collect();
    assert_eq!(seen_a.len(), a.len(), "sweeper a transitioned a row twice");
    assert_eq!(seen_b.len(), b.len(), "sweeper b transitioned a row twice");
    assert!(seen_a.is_disjoint(&seen_b), "both sweepers transitioned the same row");

    let all: HashSet<Uuid> = seen_a.union(&seen_b).copied().collect();
    assert_eq!(all, due);

    let expired: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings WHERE status = 'expired' AND expired_at IS NOT NULL",
    )
    .fetch_one(&db.pool)
    .await
    .expect("count");
    assert_eq!(expired, 60);
}

#[tokio::test]
async fn test_sweep_only_touches_due_pending_bookings() {
    let Some(db) = TestDb::connect().await else { return };
    let now = Utc::now();
    let due = db.insert_booking(BookingStatus::Pending, 1_000, now - Duration::hours(1)).await;
    let future = db.insert_booking(BookingStatus::Pending, 1_000, now + Duration::hours(1)).await;
    let confirmed = db
        .insert_booking(BookingStatus::Confirmed, 1_000, now - Duration::hours(1))
        .await;

    let repo = BookingRepository::new(db.pool.clone());
    assert_eq!(repo.count_due(now).await.expect("count"), 1);

    let job = BookingExpiryJob::new(Arc::new(repo.clone()), 50, 10);
    let ctx = JobContext::new(BOOKING_EXPIRY, "itest", None);
    let summary = job.sweep(&ctx).await.expect("sweep");
    assert_eq!((summary.claimed, summary.expired, summary.failed), (1, 1, 0));

    assert_eq!(db.booking_status(due).await, BookingStatus::Expired);
    assert_eq!(db.booking_status(future).await, BookingStatus::Pending);
    assert_eq!(db.booking_status(confirmed).await, BookingStatus::Confirmed);

    let booking = repo.find_by_id(due).await.expect("find").expect("exists");
    assert!(booking.expired_at.is_some());
}

#[tokio::test]
async fn test_rows_locked_elsewhere_are_skipped() {
    let Some(db) = TestDb::connect().await else { return };
    let past = Utc::now() - Duration::minutes(5);
    let locked = db.insert_booking(BookingStatus::Pending, 1_000, past).await;
    let free = db.insert_booking(BookingStatus::Pending, 1_000, past).await;

    let mut tx = db.pool.begin().await.expect("begin");
    sqlx::query("SELECT id FROM bookings WHERE id = $1 FOR UPDATE")
        .bind(locked)
        .execute(&mut *tx)
        .await
        .expect("lock row");

    let batch = BookingRepository::new(db.pool.clone())
        .expire_due_batch(Utc::now(), 10, &[])
        .await
        .expect("batch");
    assert_eq!(batch.transitioned, vec![free]);

    tx.rollback().await.expect("rollback");
    assert_eq!(db.booking_status(locked).await, BookingStatus::Pending);
}

/// Amount that makes the test trigger reject the expiry update.
const POISONED_AMOUNT: i64 = 13;

async fn install_expiry_rejecting_trigger(db: &TestDb) {
    sqlx::query(
        "CREATE OR REPLACE FUNCTION reject_poisoned_expiry() RETURNS trigger AS $$ \
         BEGIN \
             IF NEW.status = 'expired' AND NEW.amount_cents = 13 THEN \
                 RAISE EXCEPTION 'booking % cannot expire', NEW.id; \
             END IF; \
             RETURN NEW; \
         END; $$ LANGUAGE plpgsql",
    )
    .execute(&db.pool)
    .await
    .expect("create function");
    sqlx::query(
        "CREATE TRIGGER reject_poisoned_expiry BEFORE UPDATE ON bookings \
         FOR EACH ROW EXECUTE FUNCTION reject_poisoned_expiry()",
    )
    .execute(&db.pool)
    .await
    .expect("create trigger");
}

#[tokio::test]
async fn test_failing_rows_roll_back_alone_and_do_not_starve_the_sweep() {
    let Some(db) = TestDb::connect().await else { return };
    install_expiry_rejecting_trigger(&db).await;

    let now = Utc::now();
    let bad_a = db.insert_booking(BookingStatus::Pending, POISONED_AMOUNT, now - Duration::hours(3)).await;
    let bad_b = db.insert_booking(BookingStatus::Pending, POISONED_AMOUNT, now - Duration::hours(2)).await;
    let good = db.insert_booking(BookingStatus::Pending, 1_000, now - Duration::hours(1)).await;

    let repo = BookingRepository::new(db.pool.clone());
    let job = BookingExpiryJob::new(Arc::new(repo.clone()), 2, 10);
    let ctx = JobContext::new(BOOKING_EXPIRY, "itest", None);
    let summary = job.sweep(&ctx).await.expect("sweep");
    assert_eq!((summary.claimed, summary.expired, summary.failed), (3, 1, 2));

    assert_eq!(db.booking_status(good).await, BookingStatus::Expired);
    for id in [bad_a, bad_b] {
        let booking = repo.find_by_id(id).await.expect("find").expect("exists");
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.expiry_failed_at.is_some());
    }

    // Failed rows are ordered after fresh due rows in later runs.
    let fresh = db.insert_booking(BookingStatus::Pending, 1_000, now - Duration::minutes(5)).await;
    let batch = repo.expire_due_batch(Utc::now(), 1, &[]).await.expect("batch");
    assert_eq!(batch.transitioned, vec![fresh]);

    // Excluded ids are never claimed.
    let batch = repo
        .expire_due_batch(Utc::now(), 10, &[bad_a, bad_b])
        .await
        .expect("batch");
    assert_eq!(batch.claimed, 0);
}
