//! Dispatches queries to executors by backend id.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use querybench_core::{ExecutionError, Executor, RowSet};

/// Maps backend ids to executors.
///
/// One executor may be registered under several ids, e.g. a single
/// PostgreSQL connection serving both the hypertable and the plain table.
#[derive(Default, Clone)]
pub struct Router {
    backends: BTreeMap<String, Arc<dyn Executor>>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under `backend_id`, replacing any previous one.
    pub fn with_backend(mut self, backend_id: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        self.register(backend_id, executor);
        self
    }

    /// Register an executor under `backend_id`, replacing any previous one.
    pub fn register(&mut self, backend_id: impl Into<String>, executor: Arc<dyn Executor>) {
        let backend_id = backend_id.into();
        tracing::debug!(backend = %backend_id, "registered backend");
        self.backends.insert(backend_id, executor);
    }

    /// Check if a backend id is registered.
    pub fn contains(&self, backend_id: &str) -> bool {
        self.backends.contains_key(backend_id)
    }

    /// Registered backend ids in sorted order.
    pub fn backend_ids(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }
}

impl Executor for Router {
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        let executor = self
            .backends
            .get(backend_id)
            .ok_or_else(|| ExecutionError::UnknownBackend(backend_id.to_string()))?;
        executor.execute(backend_id, statement, ttl)
    }
}

/// Stand-in for a backend that could not be opened.
///
/// Every query fails with the stored error.
#[derive(Debug, Clone)]
pub struct Unavailable {
    error: ExecutionError,
}

impl Unavailable {
    /// Create a stand-in that always fails with `error`.
    pub fn new(error: ExecutionError) -> Self {
        Self { error }
    }
}

impl Executor for Unavailable {
    fn execute(
        &self,
        _backend_id: &str,
        _statement: &str,
        _ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        Err(self.error.clone())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}
