//! The database collaborator boundary.
//!
//! Everything above this module is synchronous, pure computation; a
//! [`Driver`] call is the only I/O and the only suspension point.

use std::future::Future;

use ferrite_core::SqlValue;

use crate::error::{OrmError, Result};

/// One result row: ordered (column name, value) pairs with
/// case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column value.
    pub fn push(&mut self, column: &str, value: SqlValue) {
        self.columns.push((String::from(column), value));
    }

    /// Looks up a column value by name, case-insensitively.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    }

    /// Returns the columns in result order.
    #[must_use]
    pub fn columns(&self) -> &[(String, SqlValue)] {
        &self.columns
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows the statement affected.
    pub rows_affected: u64,
    /// Row id generated by the database, when it reports one.
    pub last_insert_id: Option<i64>,
}

/// A failure reported by the driver, passed through verbatim.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    /// The driver's error message.
    pub message: String,
}

impl DriverError {
    /// Creates a driver error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The external database collaborator: two operations, positional `?`
/// placeholders, one parameter per placeholder left-to-right.
#[allow(async_fn_in_trait)]
pub trait Driver {
    /// Executes a write statement.
    async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> std::result::Result<ExecResult, DriverError>;

    /// Executes a read statement and returns the full result set.
    async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> std::result::Result<Vec<Row>, DriverError>;
}

/// Races a terminal operation against an external cancellation signal.
/// A signal that is already set wins the race.
///
/// Cancellation aborts the pending I/O only; accumulated query state is
/// untouched and the terminal call can be retried.
///
/// # Errors
///
/// Returns [`OrmError::Cancelled`] when `cancel` completes first.
pub async fn run_cancellable<T, F, C>(fut: F, cancel: C) -> Result<T>
where
    F: Future<Output = Result<T>>,
    C: Future<Output = ()>,
{
    tokio::select! {
        biased;
        () = cancel => Err(OrmError::Cancelled),
        result = fut => result,
    }
}
