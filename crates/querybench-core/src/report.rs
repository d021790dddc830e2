//! Benchmark results and the comparison report built from them.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::ExecutionError;
use crate::harness::Schedule;
use crate::spec::QuerySpec;
use crate::value::RowSet;

/// Outcome of running one [`QuerySpec`].
///
/// Either `rows` holds the returned rows and `error` is `None`, or `error`
/// is set and `rows` is empty. `elapsed` is measured in both cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    name: String,
    backend_id: String,
    rows: RowSet,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    elapsed: Duration,
    error: Option<ExecutionError>,
}

impl BenchmarkResult {
    /// Result of a query that returned rows.
    pub fn success(spec: &QuerySpec, rows: RowSet, elapsed: Duration) -> Self {
        Self {
            name: spec.name().to_string(),
            backend_id: spec.backend_id().to_string(),
            rows,
            elapsed,
            error: None,
        }
    }

    /// Result of a query whose executor failed.
    pub fn failure(spec: &QuerySpec, error: ExecutionError, elapsed: Duration) -> Self {
        Self {
            name: spec.name().to_string(),
            backend_id: spec.backend_id().to_string(),
            rows: Vec::new(),
            elapsed,
            error: Some(error),
        }
    }

    /// Query name from the spec.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend the query ran against.
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    /// Returned rows (empty on failure).
    pub fn rows(&self) -> &RowSet {
        &self.rows
    }

    /// Time from invoking the executor until it returned or failed.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Execution failure, if any.
    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    /// Check if the query succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// How many times faster this result ran than `baseline`.
    ///
    /// Returns `None` if either failed or this result took no measurable
    /// time.
    pub fn speedup_over(&self, baseline: &BenchmarkResult) -> Option<f64> {
        if !self.is_success() || !baseline.is_success() || self.elapsed.is_zero() {
            return None;
        }
        Some(baseline.elapsed.as_secs_f64() / self.elapsed.as_secs_f64())
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_nanos() as f64 / 1_000_000.0)
}

/// Ordered collection of results for one batch.
///
/// Results appear in the order their specs were submitted.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    schedule: Schedule,
    #[serde(rename = "total_elapsed_ms", serialize_with = "serialize_millis")]
    total_elapsed: Duration,
    results: Vec<BenchmarkResult>,
}

impl ComparisonReport {
    /// Build a report from results already in submission order.
    pub fn new(schedule: Schedule, total_elapsed: Duration, results: Vec<BenchmarkResult>) -> Self {
        Self {
            schedule,
            total_elapsed,
            results,
        }
    }

    /// Schedule the batch ran under.
    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Wall time of the whole batch.
    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    /// All results in submission order.
    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    /// Iterate results in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &BenchmarkResult> {
        self.results.iter()
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if the report is empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// First result with the given name.
    pub fn get(&self, name: &str) -> Option<&BenchmarkResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Results whose query succeeded.
    pub fn successes(&self) -> impl Iterator<Item = &BenchmarkResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    /// Results whose query failed.
    pub fn failures(&self) -> impl Iterator<Item = &BenchmarkResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Successful result with the lowest elapsed time.
    ///
    /// Ties go to the earlier submission.
    pub fn fastest(&self) -> Option<&BenchmarkResult> {
        self.successes().fold(None, |best: Option<&BenchmarkResult>, r| match best {
            Some(b) if b.elapsed <= r.elapsed => Some(b),
            _ => Some(r),
        })
    }

    /// How many times faster `candidate` ran than `baseline`.
    ///
    /// Names resolve to the first matching result. Returns `None` if either
    /// result is missing or failed, or if the candidate took no measurable
    /// time.
    pub fn speedup(&self, baseline: &str, candidate: &str) -> Option<f64> {
        self.get(candidate)?.speedup_over(self.get(baseline)?)
    }

    /// Check whether two successful results returned the same rows.
    ///
    /// Advisory only: the harness never requires compared queries to agree.
    pub fn rows_match(&self, a: &str, b: &str) -> Option<bool> {
        let a = self.get(a).filter(|r| r.is_success())?;
        let b = self.get(b).filter(|r| r.is_success())?;
        Some(a.rows == b.rows)
    }
}

impl<'a> IntoIterator for &'a ComparisonReport {
    type Item = &'a BenchmarkResult;
    type IntoIter = std::slice::Iter<'a, BenchmarkResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
