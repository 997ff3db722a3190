//! Store error type.

use thiserror::Error;

/// Errors raised by the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the database or bootstrapping the schema failed.
    #[error("failed to open job database")]
    Open {
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },
    /// A query failed.
    #[error("job store query failed: {operation}")]
    Query {
        /// Name of the store operation.
        operation: &'static str,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },
    /// A row carried a status string the code does not know.
    #[error("job {id} has unknown status {status:?}")]
    UnknownStatus {
        /// Offending job id.
        id: i64,
        /// Raw status column value.
        status: String,
    },
    /// A timestamp column did not parse as RFC 3339.
    #[error("job {id} has malformed timestamp in {column}")]
    MalformedTimestamp {
        /// Offending job id.
        id: i64,
        /// Column name.
        column: &'static str,
    },
}

impl StoreError {
    pub(crate) fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Query { operation, source }
    }
}
