//! SQLite executor.
//!
//! Runs statements on a single `rusqlite` connection. The same executor can
//! be registered under several backend ids when the compared tables live in
//! one database file.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use querybench_core::{ExecutionError, Executor, Row, RowSet, Value};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::error::BackendError;

/// SQLite backend.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run setup SQL (schema, fixtures). Returns no rows.
    pub fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Run a statement and collect every row.
    pub fn query(&self, statement: &str) -> Result<RowSet, BackendError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(statement)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut fields = Vec::with_capacity(columns.len());
            for (index, name) in columns.iter().enumerate() {
                fields.push((name.clone(), value_from_sqlite(row.get_ref(index)?)));
            }
            out.push(Row::from_fields(fields));
        }
        Ok(out)
    }
}

impl Executor for SqliteExecutor {
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        _ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        tracing::trace!(backend = backend_id, statement, "sqlite query");
        self.query(statement).map_err(ExecutionError::from)
    }
}

/// Convert a SQLite cell into a harness value.
fn value_from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}
