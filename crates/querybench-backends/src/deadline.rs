//! Per-query deadlines.
//!
//! The harness never cancels a query itself. Wrapping an executor in
//! [`DeadlineExecutor`] turns a query that overruns its deadline into an
//! [`ExecutionError::Timeout`] result.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use querybench_core::{ExecutionError, Executor, RowSet};

/// Executor wrapper that bounds how long each query may take.
///
/// The inner call runs on a worker thread. When the deadline passes the
/// caller gets a timeout immediately; the worker is detached and its
/// eventual result discarded.
pub struct DeadlineExecutor<E> {
    inner: Arc<E>,
    deadline: Duration,
}

impl<E> DeadlineExecutor<E>
where
    E: Executor + 'static,
{
    /// Wrap an executor with a per-query deadline.
    pub fn new(inner: E, deadline: Duration) -> Self {
        Self::from_arc(Arc::new(inner), deadline)
    }

    /// Wrap a shared executor with a per-query deadline.
    pub fn from_arc(inner: Arc<E>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    /// The configured deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

impl<E> Executor for DeadlineExecutor<E>
where
    E: Executor + 'static,
{
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let backend = backend_id.to_string();
        let sql = statement.to_string();

        thread::Builder::new()
            .name("querybench-deadline".to_string())
            .spawn(move || {
                let _ = tx.send(inner.execute(&backend, &sql, ttl));
            })
            .map_err(|e| ExecutionError::Other(format!("failed to spawn query worker: {}", e)))?;

        match rx.recv_timeout(self.deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    backend = backend_id,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "query exceeded deadline"
                );
                Err(ExecutionError::Timeout(self.deadline))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ExecutionError::Panicked(
                "query worker exited without a result".to_string(),
            )),
        }
    }
}
