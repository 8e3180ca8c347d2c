//! Job lock lease rows.

pub mod model;

pub use model::JobLockRow;
