//! Error types for the factor metadata store.

use thiserror::Error;

/// Problems with a factor submission, detected before any database work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent, blank or not a string.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The submission payload is not a structured record.
    #[error("factor submission must be a JSON object")]
    NotAnObject,

    /// `factor_args` is present but not a key/value mapping.
    #[error("factor_args must be a JSON object")]
    InvalidArgs,

    /// An optional text field holds something other than a string or null.
    #[error("{0} must be a string")]
    NotAString(&'static str),
}

/// Errors surfaced by the factor store and connection manager.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed submission; no transaction was opened.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Every connection attempt failed.
    #[error("failed to connect to database after {attempts} attempts: {source}")]
    Connection {
        /// Attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        source: sqlx::Error,
    },

    /// A statement, begin or commit failed; the transaction was rolled back.
    #[error("{operation} failed for {factor}: {source}")]
    Transaction {
        /// Store operation that failed.
        operation: &'static str,
        /// Factor identity the operation targeted.
        factor: String,
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// The factor name has no rows at all.
    #[error("factor not found: {name}")]
    NotFound {
        /// The factor name that was looked up.
        name: String,
    },

    /// Applying the embedded schema migrations failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Creates a transaction error.
    pub fn transaction(operation: &'static str, factor: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Transaction {
            operation,
            factor: factor.into(),
            source,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Returns true for validation failures.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Returns true when `error` is a unique-constraint violation.
#[must_use]
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = StoreError::from(ValidationError::MissingField("submitted_by"));

        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "validation error: missing required field: submitted_by"
        );
    }

    #[test]
    fn test_transaction_error_carries_context() {
        let err = StoreError::transaction("submit", "RMI@v1.2.0", sqlx::Error::RowNotFound);

        let message = err.to_string();
        assert!(message.contains("submit"));
        assert!(message.contains("RMI@v1.2.0"));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
