//! Shared test helpers for integration tests.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use upkeep_entity::booking::BookingStatus;

/// Tests share one database, so they run one at a time.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

/// A migrated, emptied test database held exclusively by one test.
pub struct TestDb {
    /// Pool connected to `UPKEEP_TEST_DATABASE_URL`.
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

impl TestDb {
    /// Connect, migrate and truncate. `None` when no test database is configured.
    pub async fn connect() -> Option<Self> {
        let Ok(url) = std::env::var("UPKEEP_TEST_DATABASE_URL") else {
            eprintln!("UPKEEP_TEST_DATABASE_URL not set; skipping");
            return None;
        };

        let guard = DB_LOCK.lock().await;
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .expect("Failed to connect to test database");

        upkeep_database::migration::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        sqlx::query("DROP TRIGGER IF EXISTS reject_poisoned_expiry ON bookings")
            .execute(&pool)
            .await
            .expect("Failed to drop test trigger");

        sqlx::query(
            "TRUNCATE job_locks, disputes, bookings, provider_profiles, users, reports CASCADE",
        )
        .execute(&pool)
        .await
        .expect("Failed to clean database");

        Some(Self {
            pool,
            _guard: guard,
        })
    }

    /// Insert a booking and return its id.
    pub async fn insert_booking(
        &self,
        status: BookingStatus,
        amount_cents: i64,
        expires_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO bookings (id, client_id, provider_id, status, amount_cents, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .bind(status)
        .bind(amount_cents)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .expect("Failed to insert booking");
        id
    }

    /// Insert an open dispute on `booking_id` and return its id.
    pub async fn insert_dispute(&self, booking_id: Uuid, evidence: &[&str]) -> Uuid {
        let id = Uuid::new_v4();
        let evidence: Vec<String> = evidence.iter().map(|s| s.to_string()).collect();
        sqlx::query(
            "INSERT INTO disputes (id, booking_id, evidence_photo_urls) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(booking_id)
        .bind(evidence)
        .execute(&self.pool)
        .await
        .expect("Failed to insert dispute");
        id
    }

    /// Current status of a booking.
    pub async fn booking_status(&self, id: Uuid) -> BookingStatus {
        sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to read booking status")
    }
}
