//! PostgreSQL and Redis backed integration tests.
//!
//! Tests skip themselves when `UPKEEP_TEST_DATABASE_URL` (or, for the
//! Redis lock, `UPKEEP_TEST_REDIS_URL`) is unset.

mod helpers;

mod booking_expiry_test;
mod dispute_test;
mod lock_test;
mod redis_lock_test;
mod reference_test;
