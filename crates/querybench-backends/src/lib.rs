//! Executors for the querybench harness.
//!
//! Each backend implements [`querybench_core::Executor`]. The [`Router`]
//! addresses several of them by backend id, and the wrappers in [`cache`]
//! and [`deadline`] layer TTL caching and per-query deadlines on top of any
//! executor.
//!
//! - **SQLite**: [`SqliteExecutor`], always available.
//! - **PostgreSQL**: `PostgresExecutor`, enable with `--features postgres`.

pub mod cache;
pub mod deadline;
pub mod error;
pub mod router;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use cache::{CacheStats, CachingExecutor};
pub use deadline::DeadlineExecutor;
pub use error::BackendError;
pub use router::{Router, Unavailable};
pub use sqlite::SqliteExecutor;

#[cfg(feature = "postgres")]
pub use postgres::PostgresExecutor;
