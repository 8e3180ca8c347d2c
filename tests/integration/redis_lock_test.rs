//! Redis lease scripts against a live server.
//!
//! Skipped when `UPKEEP_TEST_REDIS_URL` is unset.

use std::sync::Arc;
use std::time::Duration;

use upkeep_core::traits::lock::JobLock;
use upkeep_worker::lock::LeaseGuard;
use upkeep_worker::lock::redis::RedisJobLock;

async fn connect() -> Option<RedisJobLock> {
    let Ok(url) = std::env::var("UPKEEP_TEST_REDIS_URL") else {
        eprintln!("UPKEEP_TEST_REDIS_URL not set; skipping");
        return None;
    };
    Some(
        RedisJobLock::connect(&url)
            .await
            .expect("Failed to connect to test redis"),
    )
}

/// Job names are unique per test so runs never see each other's keys.
fn job_name(test: &str) -> String {
    format!("itest_{test}_{}", uuid::Uuid::new_v4())
}

#[tokio::test]
async fn test_redis_acquire_is_exclusive_and_release_checks_token() {
    let Some(lock) = connect().await else { return };
    let job = job_name("exclusive");

    let (a, b) = tokio::join!(
        lock.try_acquire(&job, "worker-a", Duration::from_secs(30)),
        lock.try_acquire(&job, "worker-b", Duration::from_secs(30)),
    );
    let mut granted: Vec<_> = [a.expect("acquire a"), b.expect("acquire b")]
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(granted.len(), 1);
    let lease = granted.remove(0);

    let mut forged = lease.clone();
    forged.token = uuid::Uuid::new_v4();
    assert!(!lock.release(&forged).await.expect("release forged"));
    assert!(
        lock.try_acquire(&job, "worker-c", Duration::from_secs(30))
            .await
            .expect("acquire")
            .is_none()
    );

    assert!(lock.release(&lease).await.expect("release"));
    assert!(!lock.release(&lease).await.expect("double release"));
    assert!(
        lock.try_acquire(&job, "worker-c", Duration::from_secs(30))
            .await
            .expect("acquire")
            .is_some()
    );
}

#[tokio::test]
async fn test_redis_renew_extends_live_lease_and_rejects_lapsed_one() {
    let Some(lock) = connect().await else { return };
    let job = job_name("renew");

    let lease = lock
        .try_acquire(&job, "worker-a", Duration::from_secs(5))
        .await
        .expect("acquire")
        .expect("granted");
    let renewed = lock
        .renew(&lease, Duration::from_secs(60))
        .await
        .expect("renew")
        .expect("live lease renews");
    assert_eq!(renewed.token, lease.token);
    assert!(renewed.expires_at > lease.expires_at);
    assert!(lock.release(&renewed).await.expect("release"));

    let stale = lock
        .try_acquire(&job, "crashed", Duration::from_millis(200))
        .await
        .expect("acquire")
        .expect("granted");
    tokio::time::sleep(Duration::from_millis(400)).await;

    let fresh = lock
        .try_acquire(&job, "worker-b", Duration::from_secs(30))
        .await
        .expect("acquire")
        .expect("lapsed lease should be reclaimable");
    assert!(lock.renew(&stale, Duration::from_secs(30)).await.expect("renew").is_none());
    assert!(!lock.release(&stale).await.expect("release stale"));
    assert!(lock.release(&fresh).await.expect("release fresh"));
}

#[tokio::test]
async fn test_redis_guard_notices_takeover() {
    let Some(lock) = connect().await else { return };
    let lock: Arc<dyn JobLock> = Arc::new(lock);
    let job = job_name("guard");

    let guard = LeaseGuard::acquire(Arc::clone(&lock), &job, "worker-a", Duration::from_secs(60))
        .await
        .expect("acquire")
        .expect("granted");
    assert!(guard.keep_alive().await.expect("keep alive"));

    assert!(lock.release(&guard.lease().await).await.expect("release"));
    let other = lock
        .try_acquire(&job, "worker-b", Duration::from_secs(60))
        .await
        .expect("acquire")
        .expect("granted to b");

    assert!(!guard.keep_alive().await.expect("keep alive"));
    assert!(!guard.release().await.expect("release"));
    assert!(lock.release(&other).await.expect("release b"));
}
