//! ORM error types.

use thiserror::Error;

/// Errors surfaced by query sets, managers, and save batches.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Expression translation or clause accumulation failed.
    #[error(transparent)]
    Core(#[from] ferrite_core::Error),

    /// The driver reported a failure; carries the attempted SQL for
    /// diagnostics, nothing is retried.
    #[error("driver error while executing `{sql}`: {message}")]
    Driver {
        /// The SQL that was attempted.
        sql: String,
        /// The driver's error message, verbatim.
        message: String,
    },

    /// A single-row terminal observed zero rows.
    #[error("no rows returned where exactly one was required")]
    NotFound,

    /// A single-row terminal observed more than one row.
    #[error("more than one row returned where exactly one was required")]
    MultipleRows,

    /// Row-to-entity materialization failed.
    #[error("row mapping failed: {0}")]
    Mapping(String),

    /// The save batch contains a circular foreign-key dependency. The
    /// batch is aborted before any statement is sent.
    #[error("cyclic foreign-key dependency among tables: {tables}")]
    CyclicDependency {
        /// Comma-joined table names participating in the cycle.
        tables: String,
    },

    /// A terminal call was cancelled before completion. Builder state
    /// is unaffected and the call can be retried.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
