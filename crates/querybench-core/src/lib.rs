//! Querybench Core - Paired-query benchmark harness.
//!
//! Runs logically equivalent queries against several backends, measures the
//! elapsed time of each on a monotonic clock, and collects the outcomes into
//! an ordered [`ComparisonReport`].
//!
//! # Quick Start
//!
//! ```ignore
//! use querybench_core::{Harness, QuerySpec};
//!
//! let specs = vec![
//!     QuerySpec::new("hyper", "timescale", "SELECT count(*) FROM rides"),
//!     QuerySpec::new("plain", "postgres", "SELECT count(*) FROM rides_pg_table"),
//! ];
//!
//! let report = Harness::sequential().run(&specs, &executor)?;
//! for result in report.iter() {
//!     println!("{}: {:?}", result.name(), result.elapsed());
//! }
//! ```

pub mod clock;
pub mod error;
pub mod executor;
pub mod harness;
pub mod report;
pub mod spec;
pub mod value;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{Error, ExecutionError};
pub use executor::Executor;
pub use harness::{Harness, Schedule};
pub use report::{BenchmarkResult, ComparisonReport};
pub use spec::QuerySpec;
pub use value::{Row, RowSet, Value};
