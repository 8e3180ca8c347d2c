//! Redis job lock using `SET NX PX` and token-checked Lua scripts.
//!
//! Suitable for multi-node deployments that already run Redis.

#[cfg(feature = "redis-lock")]
mod implementation {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tracing::info;

    use upkeep_core::error::{AppError, ErrorKind};
    use upkeep_core::result::AppResult;
    use upkeep_core::traits::lock::{JobLock, LockLease};

    /// Key prefix for job leases.
    const LOCK_PREFIX: &str = "upkeep:lock:";

    /// Delete the key only if it still holds our token.
    ///
    /// KEYS[1] = lock key
    /// ARGV[1] = token
    const RELEASE_SCRIPT: &str = r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
    "#;

    /// Extend the key's expiry only if it still holds our token.
    ///
    /// KEYS[1] = lock key
    /// ARGV[1] = token
    /// ARGV[2] = lease in milliseconds
    const RENEW_SCRIPT: &str = r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('PEXPIRE', KEYS[1], ARGV[2])
        end
        return 0
    "#;

    /// [`JobLock`] backed by Redis keys with millisecond expiry.
    #[derive(Clone)]
    pub struct RedisJobLock {
        conn: redis::aio::ConnectionManager,
    }

    impl std::fmt::Debug for RedisJobLock {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisJobLock").finish()
        }
    }

    impl RedisJobLock {
        /// Connect to Redis.
        pub async fn connect(redis_url: &str) -> AppResult<Self> {
            let client = redis::Client::open(redis_url).map_err(map_err)?;
            let conn = client.get_connection_manager().await.map_err(map_err)?;
            info!("Redis job lock connected");
            Ok(Self { conn })
        }
    }

    fn lock_key(job_name: &str) -> String {
        format!("{LOCK_PREFIX}{job_name}")
    }

    fn lease_millis(lease: Duration) -> u64 {
        u64::try_from(lease.as_millis()).unwrap_or(u64::MAX).max(1)
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Lock, format!("Redis error: {e}"), e)
    }

    #[async_trait]
    impl JobLock for RedisJobLock {
        fn backend(&self) -> &str {
            "redis"
        }

        async fn try_acquire(
            &self,
            job_name: &str,
            holder_id: &str,
            lease: Duration,
        ) -> AppResult<Option<LockLease>> {
            let granted = LockLease::grant(job_name, holder_id, Utc::now(), lease)?;
            let mut conn = self.conn.clone();

            let reply: Option<String> = redis::cmd("SET")
                .arg(lock_key(job_name))
                .arg(granted.token.to_string())
                .arg("NX")
                .arg("PX")
                .arg(lease_millis(lease))
                .query_async(&mut conn)
                .await
                .map_err(map_err)?;

            Ok(reply.map(|_| granted))
        }

        async fn release(&self, lease: &LockLease) -> AppResult<bool> {
            let mut conn = self.conn.clone();
            let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
                .key(lock_key(&lease.job_name))
                .arg(lease.token.to_string())
                .invoke_async(&mut conn)
                .await
                .map_err(map_err)?;
            Ok(deleted == 1)
        }

        async fn renew(
            &self,
            lease: &LockLease,
            duration: Duration,
        ) -> AppResult<Option<LockLease>> {
            let mut conn = self.conn.clone();
            let extended: i64 = redis::Script::new(RENEW_SCRIPT)
                .key(lock_key(&lease.job_name))
                .arg(lease.token.to_string())
                .arg(lease_millis(duration))
                .invoke_async(&mut conn)
                .await
                .map_err(map_err)?;

            if extended == 1 {
                Ok(Some(lease.extended(Utc::now(), duration)?))
            } else {
                Ok(None)
            }
        }
    }

}

#[cfg(feature = "redis-lock")]
pub use implementation::RedisJobLock;
