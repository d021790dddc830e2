//! PostgreSQL executor.
//!
//! Requires a running PostgreSQL (or TimescaleDB) instance. Enable with
//! `--features postgres`.

use std::time::Duration;

use querybench_core::{ExecutionError, Executor, Row, RowSet, Value};
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgPoolOptions, PgRow, PgValueFormat};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{JsonValue, Uuid};
use sqlx::{Column, PgPool, Row as _, TypeInfo, ValueRef};
use tokio::runtime::Runtime;

use crate::error::BackendError;

/// Default maximum pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL backend.
///
/// Owns its Tokio runtime and blocks on each query, so it can be used from
/// the synchronous harness, including from several harness threads at once.
pub struct PostgresExecutor {
    pool: PgPool,
    rt: Runtime,
}

impl PostgresExecutor {
    /// Connect to the database at `database_url`.
    pub fn connect(database_url: &str) -> Result<Self, BackendError> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS)
    }

    /// Connect with an explicit pool size.
    pub fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, BackendError> {
        let rt = Runtime::new()?;

        let pool = rt.block_on(async {
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(database_url)
                .await
        })?;

        tracing::debug!(max_connections, "connected to postgres");
        Ok(Self { pool, rt })
    }

    /// Connect using the `DATABASE_URL` environment variable.
    pub fn from_env() -> Result<Self, BackendError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            BackendError::Config("DATABASE_URL environment variable not set".to_string())
        })?;
        Self::connect(&database_url)
    }

    /// Run setup SQL (schema, fixtures). Returns no rows.
    pub fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        self.rt
            .block_on(async { sqlx::raw_sql(sql).execute(&self.pool).await })?;
        Ok(())
    }

    /// Run a statement and collect every row.
    pub fn query(&self, statement: &str) -> Result<RowSet, BackendError> {
        let rows = self
            .rt
            .block_on(async { sqlx::query(statement).fetch_all(&self.pool).await })?;

        rows.iter().map(row_from_pg).collect()
    }
}

impl Executor for PostgresExecutor {
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        _ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        tracing::trace!(backend = backend_id, statement, "postgres query");
        self.query(statement).map_err(ExecutionError::from)
    }
}

/// Convert a result row, keeping column order.
fn row_from_pg(row: &PgRow) -> Result<Row, BackendError> {
    let mut fields = Vec::with_capacity(row.columns().len());
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        fields.push((column.name().to_string(), value));
    }
    Ok(Row::from_fields(fields))
}

/// Decode one column by its Postgres type name.
///
/// Types without a mapping fail the row with a decode error; cast them to
/// `text` in the statement to compare them.
fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value, BackendError> {
    let value: Value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.into(),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(i64::from).into(),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.into(),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.into(),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(f64::from).into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.into(),
        "NUMERIC" => decode_numeric(row, index)?,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(index)?.into(),
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.into(),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|d| d.to_string())
            .into(),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map(|t| t.to_string())
            .into(),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|t| t.to_string())
            .into(),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|t| t.to_rfc3339())
            .into(),
        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)?
            .map(|u| u.to_string())
            .into(),
        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)?
            .map(|j| j.to_string())
            .into(),
        other => {
            return Err(decode_error(
                index,
                format!("unsupported column type {}; cast it to text", other).into(),
            ))
        }
    };
    Ok(value)
}

/// Decode a NUMERIC column as a float.
fn decode_numeric(row: &PgRow, index: usize) -> Result<Value, BackendError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let parsed = match raw.format() {
        PgValueFormat::Binary => {
            numeric_from_binary(raw.as_bytes().map_err(|e| decode_error(index, e))?)
        }
        PgValueFormat::Text => raw
            .as_str()
            .map_err(|e| decode_error(index, e))?
            .parse::<f64>()
            .ok(),
    };
    parsed
        .map(Value::Float)
        .ok_or_else(|| decode_error(index, "malformed NUMERIC value".into()))
}

/// Parse the binary NUMERIC wire format: `ndigits`, `weight`, `sign` and
/// `dscale` as 16-bit words, then `ndigits` base-10000 digits.
fn numeric_from_binary(bytes: &[u8]) -> Option<f64> {
    let word = |i: usize| -> Option<u16> {
        let b = bytes.get(i * 2..i * 2 + 2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    };

    let ndigits = usize::from(word(0)?);
    let weight = i32::from(word(1)? as i16);
    let sign = word(2)?;
    match sign {
        NUMERIC_POS | NUMERIC_NEG => {}
        NUMERIC_NAN => return Some(f64::NAN),
        NUMERIC_PINF => return Some(f64::INFINITY),
        NUMERIC_NINF => return Some(f64::NEG_INFINITY),
        _ => return None,
    }

    let mut value = 0.0;
    for i in 0..ndigits {
        let digit = word(4 + i)?;
        if digit >= 10_000 {
            return None;
        }
        value += f64::from(digit) * 10_000f64.powi(weight - i as i32);
    }
    Some(if sign == NUMERIC_NEG { -value } else { value })
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

fn decode_error(index: usize, source: BoxDynError) -> BackendError {
    BackendError::Postgres(sqlx::Error::ColumnDecode {
        index: index.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Runs only when DATABASE_URL points at a live server.
    fn live() -> Option<PostgresExecutor> {
        std::env::var("DATABASE_URL").ok()?;
        PostgresExecutor::from_env().ok()
    }

    #[test]
    fn test_typed_columns() {
        let Some(pg) = live() else { return };

        let rows = pg
            .query("SELECT 1::int4 AS i, 2.5::float8 AS f, 'x'::text AS t, true AS b, NULL::int8 AS n")
            .unwrap();
        assert_eq!(
            rows,
            vec![Row::new()
                .with("i", 1)
                .with("f", 2.5)
                .with("t", "x")
                .with("b", true)
                .with("n", Value::Null)]
        );
    }

    /// Encode words as the NUMERIC wire format.
    fn numeric(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn test_numeric_from_binary() {
        // 12.5: two digits, weight 0, dscale 1
        assert_eq!(numeric_from_binary(&numeric(&[2, 0, NUMERIC_POS, 1, 12, 5000])), Some(12.5));
        assert_eq!(numeric_from_binary(&numeric(&[1, 0, NUMERIC_NEG, 0, 1])), Some(-1.0));
        assert_eq!(numeric_from_binary(&numeric(&[1, 1, NUMERIC_POS, 0, 2])), Some(20_000.0));
        assert_eq!(numeric_from_binary(&numeric(&[0, 0, NUMERIC_POS, 0])), Some(0.0));
        assert!(numeric_from_binary(&numeric(&[0, 0, NUMERIC_NAN, 0])).unwrap().is_nan());
    }

    #[test]
    fn test_numeric_from_binary_rejects_malformed() {
        assert_eq!(numeric_from_binary(&numeric(&[2, 0, NUMERIC_POS, 0, 1])), None);
        assert_eq!(numeric_from_binary(&numeric(&[1, 0, NUMERIC_POS, 0, 10_000])), None);
        assert_eq!(numeric_from_binary(&numeric(&[1, 0, 0x1234, 0, 1])), None);
        assert_eq!(numeric_from_binary(&[0, 1]), None);
    }

    #[test]
    fn test_aggregate_columns_keep_values() {
        let Some(pg) = live() else { return };

        let rows = pg
            .query("SELECT SUM(x)::numeric AS total, DATE '2024-01-02' AS day FROM (VALUES (1), (2)) AS v(x)")
            .unwrap();
        assert_eq!(
            rows,
            vec![Row::new().with("total", 3.0).with("day", "2024-01-02")]
        );

        let other = pg.query("SELECT SUM(x)::numeric AS total FROM (VALUES (1)) AS v(x)").unwrap();
        assert_ne!(rows[0].get("total"), other[0].get("total"));
    }

    #[test]
    fn test_unmapped_type_fails_visibly() {
        let Some(pg) = live() else { return };

        let err = pg
            .execute("pg", "SELECT INTERVAL '1 day' AS span", Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Statement(_)));
    }

    #[test]
    fn test_statement_error_maps_to_statement() {
        let Some(pg) = live() else { return };

        let err = pg
            .execute("pg", "SELECT * FROM querybench_missing_table", Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Statement(_)));
    }
}
