//! Executor capability consumed by the harness.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ExecutionError;
use crate::value::RowSet;

/// Runs a statement against a named backend.
///
/// Connection management, credentials and caching policy belong to the
/// implementor. The harness only calls [`Executor::execute`] and times it.
pub trait Executor: Send + Sync {
    /// Execute `statement` on `backend_id`, returning all rows.
    ///
    /// `ttl` is how long a cached result for the same statement may be
    /// reused. Zero means always run against the backend.
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        ttl: Duration,
    ) -> Result<RowSet, ExecutionError>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        (**self).execute(backend_id, statement, ttl)
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        (**self).execute(backend_id, statement, ttl)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        (**self).execute(backend_id, statement, ttl)
    }
}
