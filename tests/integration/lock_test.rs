//! PostgreSQL lease-table lock behaviour.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use upkeep_core::traits::lock::JobLock;
use upkeep_core::traits::references::ReferenceSource;
use upkeep_core::traits::storage::ObjectStore;
use upkeep_database::repositories::{PgJobLock, ReferenceCollector};
use upkeep_storage::KeyExtractor;
use upkeep_storage::providers::MemoryObjectStore;
use upkeep_worker::jobs::{ORPHAN_RECONCILIATION, OrphanReconciler};
use upkeep_worker::{JobHealthRegistry, JobRunner, RunOutcome, ScheduledJob};

use crate::helpers::TestDb;

#[tokio::test]
async fn test_concurrent_acquire_grants_one_lease() {
    let Some(db) = TestDb::connect().await else { return };
    let a = PgJobLock::new(db.pool.clone());
    let b = PgJobLock::new(db.pool.clone());

    let (ra, rb) = tokio::join!(
        a.try_acquire("booking_expiry", "worker-a", Duration::from_secs(30)),
        b.try_acquire("booking_expiry", "worker-b", Duration::from_secs(30)),
    );
    let granted = [ra.expect("acquire a"), rb.expect("acquire b")]
        .into_iter()
        .flatten()
        .count();
    assert_eq!(granted, 1);
}

#[tokio::test]
async fn test_release_requires_matching_token() {
    let Some(db) = TestDb::connect().await else { return };
    let lock = PgJobLock::new(db.pool.clone());

    let lease = lock
        .try_acquire("orphan_reconciliation", "worker-a", Duration::from_secs(30))
        .await
        .expect("acquire")
        .expect("granted");

    let mut forged = lease.clone();
    forged.token = uuid::Uuid::new_v4();
    assert!(!lock.release(&forged).await.expect("release"));
    assert!(lock.current("orphan_reconciliation").await.expect("read").is_some());

    assert!(lock.release(&lease).await.expect("release"));
    assert!(lock.current("orphan_reconciliation").await.expect("read").is_none());
    assert!(!lock.release(&lease).await.expect("double release"));
}

#[tokio::test]
async fn test_expired_lease_is_reclaimed_and_renew_fails() {
    let Some(db) = TestDb::connect().await else { return };
    let lock = PgJobLock::new(db.pool.clone());

    let stale = lock
        .try_acquire("booking_expiry", "crashed", Duration::from_millis(200))
        .await
        .expect("acquire")
        .expect("granted");
    tokio::time::sleep(Duration::from_millis(400)).await;

    let fresh = lock
        .try_acquire("booking_expiry", "worker-b", Duration::from_secs(30))
        .await
        .expect("acquire")
        .expect("expired lease should be reclaimable");
    assert_ne!(fresh.token, stale.token);

    assert!(lock.renew(&stale, Duration::from_secs(30)).await.expect("renew").is_none());
    assert!(!lock.release(&stale).await.expect("release"));

    let renewed = lock
        .renew(&fresh, Duration::from_secs(120))
        .await
        .expect("renew")
        .expect("live lease renews");
    assert_eq!(renewed.token, fresh.token);
    assert!(renewed.expires_at > fresh.expires_at);
}

#[tokio::test]
async fn test_held_lock_makes_reconciliation_a_no_op() {
    let Some(db) = TestDb::connect().await else { return };
    let lock: Arc<dyn JobLock> = Arc::new(PgJobLock::new(db.pool.clone()));

    let store = Arc::new(MemoryObjectStore::new("uploads"));
    store
        .put("photos/orphan.jpg", Utc::now() - chrono::Duration::days(30), 10)
        .await;

    let references: Arc<dyn ReferenceSource> = Arc::new(
        ReferenceCollector::new(
            db.pool.clone(),
            upkeep_core::config::jobs::default_references(),
            KeyExtractor::new(Some("uploads".to_string())),
        )
        .expect("collector"),
    );
    let job = ScheduledJob {
        name: ORPHAN_RECONCILIATION.to_string(),
        schedule: "0 0 3 * * 0".to_string(),
        timeout: Duration::from_secs(10),
        lease: Duration::from_secs(60),
        enabled: true,
        exclusive: true,
        handler: Arc::new(OrphanReconciler::new(
            Some(store.clone() as Arc<dyn ObjectStore>),
            references,
            chrono::Duration::days(7),
            100,
            None,
        )),
    };

    let _held = lock
        .try_acquire(ORPHAN_RECONCILIATION, "other-replica", Duration::from_secs(60))
        .await
        .expect("acquire")
        .expect("granted");

    let health = JobHealthRegistry::new();
    health.register(&job.name, &job.schedule, true).await;
    let runner = JobRunner::new(Arc::clone(&lock), "this-replica".to_string(), health);

    assert_eq!(runner.run(&job).await, RunOutcome::LockNotAcquired);
    assert!(store.contains("photos/orphan.jpg").await);
}
