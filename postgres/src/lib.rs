//! `PostgreSQL` storage for Courtside.
//!
//! [`PgStore`] implements the core [`Store`](courtside_core::store::Store)
//! trait on a sqlx connection pool. Leases are `SELECT ... FOR UPDATE` row
//! locks held until the transaction commits or is dropped, and the
//! `bookings_no_overlap` exclusion constraint backs the conflict check at the
//! database level.
//!
//! # Example
//!
//! ```ignore
//! use courtside_postgres::PgStore;
//! use sqlx::postgres::PgPoolOptions;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PgPoolOptions::new().connect("postgres://localhost/courtside").await?;
//!     let store = PgStore::from_pool(pool);
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

mod rows;
mod store;
mod transaction;

pub use store::PgStore;
pub use transaction::PgTransaction;

use courtside_core::StorageError;

/// SQLSTATE for `exclusion_violation`.
const EXCLUSION_VIOLATION: &str = "23P01";

/// Map a sqlx error to a [`StorageError`], surfacing constraint violations as conflicts.
pub(crate) fn storage_error(context: &str, error: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() || db_err.code().as_deref() == Some(EXCLUSION_VIOLATION) {
            return StorageError::Conflict(
                db_err.constraint().unwrap_or("unknown constraint").to_string(),
            );
        }
    }
    StorageError::Database(format!("{context}: {error}"))
}
