//! Error taxonomy for booking, match and waitlist operations.

use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The database rejected a write because it would break a constraint
    /// (overlapping confirmed bookings, duplicate participant rows).
    #[error("Constraint violated: {0}")]
    Conflict(String),

    /// A row could not be decoded into a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Database or connection failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Errors returned by the booking, match and waitlist operations.
///
/// Every variant carries a message that can be shown to the user verbatim,
/// except [`BookingError::Storage`], which must be reported generically.
#[derive(Error, Debug)]
pub enum BookingError {
    /// Malformed or missing input, or a start time that is not in the future.
    #[error("{0}")]
    Validation(String),

    /// Slot taken, match full, duplicate join or waitlist registration.
    #[error("{0}")]
    Conflict(String),

    /// Caller acts on a booking they do not own.
    #[error("{0}")]
    Forbidden(String),

    /// Booking, match or entry absent, or not in the expected state.
    #[error("{0}")]
    NotFound(String),

    /// Waitlist confirmation token unknown, consumed or expired.
    #[error("{0}")]
    ExpiredOrInvalid(String),

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for BookingError {
    fn from(error: StorageError) -> Self {
        match error {
            // Raised when a concurrent insert slipped past the conflict query.
            StorageError::Conflict(_) => Self::Conflict("Slot is no longer available".to_string()),
            other => Self::Storage(other),
        }
    }
}

impl BookingError {
    /// Shorthand for [`BookingError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`BookingError::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Shorthand for [`BookingError::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Shorthand for [`BookingError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_surfaces_as_conflict() {
        let err: BookingError = StorageError::Conflict("bookings_no_overlap".into()).into();
        assert!(matches!(err, BookingError::Conflict(_)));

        let err: BookingError = StorageError::Database("connection reset".into()).into();
        assert!(matches!(err, BookingError::Storage(_)));
    }
}
