//! Benchmark harness.
//!
//! Executes a batch of [`QuerySpec`]s through an [`Executor`], timing each
//! call on a monotonic [`Clock`], and returns a [`ComparisonReport`] with one
//! result per spec in submission order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::clock::{Clock, MonotonicClock};
use crate::error::{Error, ExecutionError};
use crate::executor::Executor;
use crate::report::{BenchmarkResult, ComparisonReport};
use crate::spec::QuerySpec;

/// How the specs of a batch are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// One after another on the calling thread.
    #[default]
    Sequential,
    /// One thread per spec, joined before the report is returned.
    Parallel,
}

/// Paired-query benchmark harness.
///
/// Holds no connection state; the same harness can run any number of
/// batches.
#[derive(Clone)]
pub struct Harness {
    schedule: Schedule,
    clock: Arc<dyn Clock>,
}

impl Harness {
    /// Create a harness with the given schedule and a monotonic clock.
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            clock: Arc::new(MonotonicClock),
        }
    }

    /// Harness that runs specs one after another.
    pub fn sequential() -> Self {
        Self::new(Schedule::Sequential)
    }

    /// Harness that runs each spec on its own thread.
    pub fn parallel() -> Self {
        Self::new(Schedule::Parallel)
    }

    /// Replace the clock used for measurements.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configured schedule.
    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Run a batch of specs.
    ///
    /// Every spec is validated before the executor is called; a malformed
    /// spec fails the whole call with [`Error::Config`]. Executor failures
    /// are recorded on the affected result and never abort the batch.
    pub fn run<E>(&self, specs: &[QuerySpec], executor: &E) -> Result<ComparisonReport, Error>
    where
        E: Executor + ?Sized,
    {
        for (index, spec) in specs.iter().enumerate() {
            spec.validate(index)?;
        }

        tracing::info!(
            specs = specs.len(),
            schedule = ?self.schedule,
            "running benchmark batch"
        );

        let start = self.clock.now();
        let results = match self.schedule {
            Schedule::Sequential => specs
                .iter()
                .map(|spec| self.measure(spec, executor))
                .collect(),
            Schedule::Parallel => self.run_parallel(specs, executor),
        };
        let total_elapsed = self.clock.since(start);

        let report = ComparisonReport::new(self.schedule, total_elapsed, results);
        tracing::info!(
            succeeded = report.successes().count(),
            failed = report.failures().count(),
            total_ms = total_elapsed.as_millis() as u64,
            "benchmark batch complete"
        );
        Ok(report)
    }

    /// Run every spec on its own scoped thread.
    ///
    /// Results arrive in completion order and are slotted back by
    /// submission index.
    fn run_parallel<E>(&self, specs: &[QuerySpec], executor: &E) -> Vec<BenchmarkResult>
    where
        E: Executor + ?Sized,
    {
        let mut slots: Vec<Option<BenchmarkResult>> = vec![None; specs.len()];
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(specs.len());
            for (index, spec) in specs.iter().enumerate() {
                let tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("querybench-{}", index))
                    .spawn_scoped(scope, move || {
                        let result = self.measure(spec, executor);
                        let _ = tx.send((index, result));
                    });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        tracing::warn!(query = spec.name(), error = %e, "failed to spawn worker");
                        slots[index] = Some(BenchmarkResult::failure(
                            spec,
                            ExecutionError::Other(format!("failed to spawn worker: {}", e)),
                            Duration::ZERO,
                        ));
                    }
                }
            }

            // An unjoined worker that panicked would make `scope` panic.
            for handle in handles {
                let _ = handle.join();
            }
        });
        drop(tx);

        for (index, result) in rx {
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .zip(specs)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| {
                    BenchmarkResult::failure(
                        spec,
                        ExecutionError::Panicked("worker exited without a result".to_string()),
                        Duration::ZERO,
                    )
                })
            })
            .collect()
    }

    /// Execute and time a single spec.
    fn measure<E>(&self, spec: &QuerySpec, executor: &E) -> BenchmarkResult
    where
        E: Executor + ?Sized,
    {
        tracing::debug!(
            query = spec.name(),
            backend = spec.backend_id(),
            "executing query"
        );

        let start = self.clock.now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            executor.execute(spec.backend_id(), spec.statement(), spec.cache_ttl())
        }));
        let elapsed = self.clock.since(start);

        match outcome {
            Ok(Ok(rows)) => {
                tracing::debug!(
                    query = spec.name(),
                    backend = spec.backend_id(),
                    rows = rows.len(),
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "query finished"
                );
                BenchmarkResult::success(spec, rows, elapsed)
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    query = spec.name(),
                    backend = spec.backend_id(),
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    error = %error,
                    "query failed"
                );
                BenchmarkResult::failure(spec, error, elapsed)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(
                    query = spec.name(),
                    backend = spec.backend_id(),
                    panic = %message,
                    "executor panicked"
                );
                BenchmarkResult::failure(spec, ExecutionError::Panicked(message), elapsed)
            }
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::sequential()
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
