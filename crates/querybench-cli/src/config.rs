//! Benchmark run configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use querybench_core::{QuerySpec, Schedule};
use serde::Deserialize;

use crate::formatter::OutputFormat;

/// Aggregate query from the NYC taxi rides comparison.
pub const DEFAULT_QUERY: &str =
    "SELECT rate_code, COUNT(vendor_id) AS num_trips FROM {table} GROUP BY rate_code ORDER BY rate_code;";

/// Placeholder replaced by the table name in query templates.
pub const TABLE_PLACEHOLDER: &str = "{table}";

/// Default partitioned (hypertable) table name.
pub const DEFAULT_HYPERTABLE: &str = "rides";

/// Default plain table name.
pub const DEFAULT_PLAIN_TABLE: &str = "rides_pg_table";

/// Backend id used for the hypertable side of a paired run.
pub const HYPERTABLE_BACKEND: &str = "hypertable";

/// Backend id used for the plain-table side of a paired run.
pub const PLAIN_BACKEND: &str = "plain";

/// Where a backend lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendTarget {
    /// SQLite database file.
    Sqlite { path: PathBuf },
    /// PostgreSQL connection URL.
    Postgres { url: String },
}

/// Resolved benchmark configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Backend used for any spec whose backend id has no explicit entry.
    pub default_backend: Option<BackendTarget>,

    /// Explicitly configured backends by id.
    pub backends: BTreeMap<String, BackendTarget>,

    /// Queries to run, in display order.
    pub specs: Vec<QuerySpec>,

    /// How the batch is scheduled.
    pub schedule: Schedule,

    /// Per-query deadline. None lets queries run to completion.
    pub timeout: Option<Duration>,

    /// Output format.
    pub format: OutputFormat,
}

impl BenchConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self {
            default_backend: None,
            backends: BTreeMap::new(),
            specs: Vec::new(),
            schedule: Schedule::Sequential,
            timeout: None,
            format: OutputFormat::Table,
        }
    }

    /// Set the fallback backend.
    pub fn with_default_backend(mut self, target: BackendTarget) -> Self {
        self.default_backend = Some(target);
        self
    }

    /// Add an explicitly configured backend.
    pub fn with_backend(mut self, backend_id: impl Into<String>, target: BackendTarget) -> Self {
        self.backends.insert(backend_id.into(), target);
        self
    }

    /// Append a query.
    pub fn with_spec(mut self, spec: QuerySpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Set the schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set a per-query deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Backend target for a backend id, falling back to the default.
    pub fn target_for(&self, backend_id: &str) -> Option<&BackendTarget> {
        self.backends
            .get(backend_id)
            .or(self.default_backend.as_ref())
    }

    /// Distinct backend ids referenced by the specs, in first-use order.
    pub fn referenced_backends(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for spec in &self.specs {
            if !ids.contains(&spec.backend_id()) {
                ids.push(spec.backend_id());
            }
        }
        ids
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the hypertable/plain-table pair from a statement template.
pub fn paired_specs(template: &str, hypertable: &str, plain_table: &str, ttl: Duration) -> Vec<QuerySpec> {
    vec![
        QuerySpec::new(
            "Hypertable Query",
            HYPERTABLE_BACKEND,
            template.replace(TABLE_PLACEHOLDER, hypertable),
        )
        .with_cache_ttl(ttl),
        QuerySpec::new(
            "PG Table Query",
            PLAIN_BACKEND,
            template.replace(TABLE_PLACEHOLDER, plain_table),
        )
        .with_cache_ttl(ttl),
    ]
}

/// JSON spec file layout.
///
/// ```json
/// {
///   "backends": {
///     "timescale": { "kind": "postgres", "url": "postgres://localhost/nyc" },
///     "local": { "kind": "sqlite", "path": "rides.db" }
///   },
///   "queries": [
///     { "name": "hyper", "backend": "timescale", "statement": "SELECT ..." },
///     { "name": "plain", "backend": "local", "statement": "SELECT ...", "ttl_secs": 60 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecFile {
    #[serde(default)]
    pub backends: BTreeMap<String, BackendTarget>,
    pub queries: Vec<QueryEntry>,
}

/// One query in a spec file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryEntry {
    pub name: String,
    pub backend: String,
    pub statement: String,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl SpecFile {
    /// Parse a spec file from JSON text.
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid spec file")
    }

    /// Read and parse a spec file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read spec file {}", path.display()))?;
        Self::parse(&json)
    }

    /// Convert entries to query specs. `default_ttl` applies where an
    /// entry sets none.
    pub fn query_specs(&self, default_ttl: Duration) -> Vec<QuerySpec> {
        self.queries
            .iter()
            .map(|q| {
                let ttl = q.ttl_secs.map(Duration::from_secs).unwrap_or(default_ttl);
                QuerySpec::new(&q.name, &q.backend, &q.statement).with_cache_ttl(ttl)
            })
            .collect()
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "querybench")]
#[command(version, about = "Compare query latency across database backends", long_about = None)]
pub struct Args {
    /// SQLite database file used as the default backend.
    #[arg(long)]
    pub sqlite: Option<PathBuf>,

    /// PostgreSQL URL used as the default backend when --sqlite is not given.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// JSON spec file listing backends and queries.
    #[arg(short = 's', long)]
    pub specs: Option<PathBuf>,

    /// Statement template for a paired run; `{table}` becomes each table name.
    #[arg(short = 'q', long, default_value = DEFAULT_QUERY)]
    pub query: String,

    /// Partitioned table name for a paired run.
    #[arg(long, default_value = DEFAULT_HYPERTABLE)]
    pub hypertable: String,

    /// Plain table name for a paired run.
    #[arg(long, default_value = DEFAULT_PLAIN_TABLE)]
    pub plain_table: String,

    /// Run queries concurrently instead of one after another.
    #[arg(long)]
    pub parallel: bool,

    /// Result cache TTL in seconds (0 always hits the backend).
    #[arg(long, default_value_t = 0)]
    pub ttl_secs: u64,

    /// Per-query deadline in seconds (0 disables).
    #[arg(long, default_value_t = 0)]
    pub timeout_secs: u64,

    /// Output format.
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,
}

impl Args {
    /// Resolve arguments (and the spec file, if any) into a configuration.
    pub fn into_config(self) -> anyhow::Result<BenchConfig> {
        let ttl = Duration::from_secs(self.ttl_secs);

        let mut config = BenchConfig::new().with_format(self.format).with_schedule(
            if self.parallel {
                Schedule::Parallel
            } else {
                Schedule::Sequential
            },
        );

        if let Some(path) = self.sqlite {
            config = config.with_default_backend(BackendTarget::Sqlite { path });
        } else if let Some(url) = self.database_url {
            config = config.with_default_backend(BackendTarget::Postgres { url });
        }

        if self.timeout_secs > 0 {
            config = config.with_timeout(Duration::from_secs(self.timeout_secs));
        }

        let specs = match self.specs {
            Some(path) => {
                let file = SpecFile::load(&path)?;
                let specs = file.query_specs(ttl);
                for (backend_id, target) in file.backends {
                    config = config.with_backend(backend_id, target);
                }
                specs
            }
            None => {
                if !self.query.contains(TABLE_PLACEHOLDER) {
                    anyhow::bail!("query template must contain {}", TABLE_PLACEHOLDER);
                }
                paired_specs(&self.query, &self.hypertable, &self.plain_table, ttl)
            }
        };

        Ok(specs.into_iter().fold(config, BenchConfig::with_spec))
    }
}
