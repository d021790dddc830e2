//! Querybench Command-Line Runner
//!
//! Runs the same query against two (or more) backends, times each run, and
//! prints the rows and timings side by side.

mod config;
mod formatter;

use std::sync::Arc;

use clap::Parser;
use querybench_backends::{CachingExecutor, DeadlineExecutor, Router, SqliteExecutor, Unavailable};
use querybench_core::{ExecutionError, Executor, Harness};

use config::{Args, BackendTarget, BenchConfig};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "querybench_cli=info,querybench_core=info,querybench_backends=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.into_config()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        specs = config.specs.len(),
        schedule = ?config.schedule,
        timeout = ?config.timeout,
        "configuration loaded"
    );

    let formatter = formatter::create_formatter(config.format);
    match run(&config) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            std::process::exit(1);
        }
    }
}

/// Build executors, run the batch, and render the report.
fn run(config: &BenchConfig) -> anyhow::Result<String> {
    let router = build_router(config);
    let cached = CachingExecutor::new(router);
    let executor: Box<dyn Executor> = match config.timeout {
        Some(deadline) => Box::new(DeadlineExecutor::new(cached, deadline)),
        None => Box::new(cached),
    };

    let harness = Harness::new(config.schedule);
    let report = harness.run(&config.specs, &*executor)?;

    let formatter = formatter::create_formatter(config.format);
    Ok(formatter.format_report(&report, &config.specs))
}

/// Register an executor for every backend id the specs reference.
///
/// Ids sharing a target share one connection. Ids without a target are
/// left unregistered and fail as unknown backends.
fn build_router(config: &BenchConfig) -> Router {
    let mut opened: Vec<(&BackendTarget, Arc<dyn Executor>)> = Vec::new();
    let mut router = Router::new();

    for backend_id in config.referenced_backends() {
        let Some(target) = config.target_for(backend_id) else {
            tracing::warn!(backend = backend_id, "no backend configured");
            continue;
        };

        let executor = match opened.iter().find(|(t, _)| *t == target) {
            Some((_, executor)) => executor.clone(),
            None => {
                let executor = open_backend(backend_id, target);
                opened.push((target, executor.clone()));
                executor
            }
        };
        router.register(backend_id, executor);
    }

    router
}

/// Open a backend, or a stand-in that reports why it could not be opened.
fn open_backend(backend_id: &str, target: &BackendTarget) -> Arc<dyn Executor> {
    match connect(target) {
        Ok(executor) => executor,
        Err(error) => {
            tracing::warn!(backend = backend_id, error = %error, "backend unavailable");
            Arc::new(Unavailable::new(error))
        }
    }
}

fn connect(target: &BackendTarget) -> Result<Arc<dyn Executor>, ExecutionError> {
    match target {
        BackendTarget::Sqlite { path } => {
            if !path.exists() {
                return Err(ExecutionError::Connection(format!(
                    "sqlite database {} does not exist",
                    path.display()
                )));
            }
            Ok(Arc::new(SqliteExecutor::open(path)?))
        }
        #[cfg(feature = "postgres")]
        BackendTarget::Postgres { url } => {
            Ok(Arc::new(querybench_backends::PostgresExecutor::connect(url)?))
        }
        #[cfg(not(feature = "postgres"))]
        BackendTarget::Postgres { .. } => Err(ExecutionError::Other(
            "built without PostgreSQL support; rebuild with --features postgres".to_string(),
        )),
    }
}
