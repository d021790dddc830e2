//! Harness error types.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Harness-level errors.
///
/// These abort a whole `run` call. Failures of individual queries are
/// reported through [`ExecutionError`] on the corresponding result instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A query spec in the submitted batch is malformed.
    #[error("configuration error: spec #{index}: {message}")]
    Config { index: usize, message: String },
}

impl Error {
    /// Create a configuration error for the spec at `index`.
    pub fn config(index: usize, message: impl Into<String>) -> Self {
        Error::Config {
            index,
            message: message.into(),
        }
    }
}

/// Failure of a single query execution.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecutionError {
    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the statement.
    #[error("statement error: {0}")]
    Statement(String),

    /// No backend is registered under the given id.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// The query did not finish before its deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The executor panicked while running the query.
    #[error("executor panicked: {0}")]
    Panicked(String),

    /// Any other executor failure.
    #[error("{0}")]
    Other(String),
}
