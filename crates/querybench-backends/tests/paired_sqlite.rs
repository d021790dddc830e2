//! End-to-end paired comparison against SQLite.
//!
//! Two copies of the rides table stand in for the partitioned and the plain
//! table; the harness runs the same aggregate against both.

use std::sync::Arc;
use std::time::Duration;

use querybench_backends::{CachingExecutor, DeadlineExecutor, Router, SqliteExecutor};
use querybench_core::{ExecutionError, Executor, Harness, QuerySpec, Row};

const RATE_CODE_QUERY: &str =
    "SELECT rate_code, COUNT(vendor_id) AS num_trips FROM {table} GROUP BY rate_code ORDER BY rate_code";

fn rides_database(path: &std::path::Path) -> Arc<SqliteExecutor> {
    let backend = SqliteExecutor::open(path).unwrap();
    backend
        .execute_batch(
            r#"
        CREATE TABLE rides (vendor_id TEXT, pickup_datetime TEXT, rate_code INTEGER);
        CREATE INDEX idx_rides_pickup ON rides(pickup_datetime);
        CREATE TABLE rides_pg_table (vendor_id TEXT, pickup_datetime TEXT, rate_code INTEGER);

        WITH RECURSIVE seq(n) AS (SELECT 0 UNION ALL SELECT n + 1 FROM seq WHERE n < 999)
        INSERT INTO rides
        SELECT CAST(n % 3 AS TEXT), datetime('2016-01-01', '+' || n || ' minutes'), 1 + n % 6
        FROM seq;

        INSERT INTO rides_pg_table SELECT * FROM rides;
        "#,
        )
        .unwrap();
    Arc::new(backend)
}

fn paired_specs() -> Vec<QuerySpec> {
    vec![
        QuerySpec::new("Hypertable Query", "hypertable", RATE_CODE_QUERY.replace("{table}", "rides")),
        QuerySpec::new(
            "PG Table Query",
            "plain",
            RATE_CODE_QUERY.replace("{table}", "rides_pg_table"),
        ),
    ]
}

#[test]
fn test_paired_rate_code_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let db = rides_database(&dir.path().join("rides.db"));
    let router = Router::new()
        .with_backend("hypertable", db.clone())
        .with_backend("plain", db);

    for harness in [Harness::sequential(), Harness::parallel()] {
        let report = harness.run(&paired_specs(), &router).unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.results()[0].name(), "Hypertable Query");
        assert_eq!(report.results()[1].name(), "PG Table Query");

        let hyper = report.get("Hypertable Query").unwrap();
        assert!(hyper.is_success(), "{:?}", hyper.error());
        assert_eq!(hyper.rows().len(), 6);
        assert_eq!(
            hyper.rows()[0],
            Row::new().with("rate_code", 1).with("num_trips", 167)
        );

        assert_eq!(report.rows_match("Hypertable Query", "PG Table Query"), Some(true));
        assert!(report.fastest().is_some());
    }
}

#[test]
fn test_outage_on_one_side_keeps_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let db = rides_database(&dir.path().join("rides.db"));
    // "plain" is never registered, simulating a backend that is down.
    let router = Router::new().with_backend("hypertable", db);

    let report = Harness::parallel().run(&paired_specs(), &router).unwrap();
    assert!(report.results()[0].is_success());
    assert_eq!(
        report.results()[1].error(),
        Some(&ExecutionError::UnknownBackend("plain".to_string()))
    );
    assert!(report.results()[1].rows().is_empty());
}

#[test]
fn test_cached_and_deadlined_stack() {
    let dir = tempfile::tempdir().unwrap();
    let db = rides_database(&dir.path().join("rides.db"));
    let router = Router::new()
        .with_backend("hypertable", db.clone())
        .with_backend("plain", db);
    let cache = Arc::new(CachingExecutor::new(router));
    let executor = DeadlineExecutor::from_arc(Arc::clone(&cache), Duration::from_secs(10));

    let specs: Vec<_> = paired_specs()
        .into_iter()
        .map(|spec| spec.with_cache_ttl(Duration::from_secs(300)))
        .collect();

    let harness = Harness::sequential();
    let first = harness.run(&specs, &executor).unwrap();
    let second = harness.run(&specs, &executor).unwrap();

    assert_eq!(first.results()[0].rows(), second.results()[0].rows());
    assert!(second.iter().all(|r| r.is_success()));
    assert_eq!(cache.stats().misses(), 2);
    assert_eq!(cache.stats().hits(), 2);
    assert_eq!(cache.len(), 2);

    let direct = executor
        .execute("plain", "SELECT COUNT(*) AS n FROM rides_pg_table", Duration::ZERO)
        .unwrap();
    assert_eq!(direct, vec![Row::new().with("n", 1000)]);
}
