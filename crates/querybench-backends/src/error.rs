//! Backend error types.

use querybench_core::ExecutionError;
use thiserror::Error;

/// Errors raised while setting up or talking to a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL error.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Backend configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BackendError> for ExecutionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Sqlite(e) => sqlite_execution_error(e),
            #[cfg(feature = "postgres")]
            BackendError::Postgres(e) => postgres_execution_error(e),
            BackendError::Config(msg) => ExecutionError::Other(msg),
            BackendError::Io(e) => ExecutionError::Connection(e.to_string()),
        }
    }
}

fn sqlite_execution_error(err: rusqlite::Error) -> ExecutionError {
    use rusqlite::ErrorCode;

    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::CannotOpen
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::NotADatabase
            ) =>
        {
            ExecutionError::Connection(err.to_string())
        }
        _ => ExecutionError::Statement(err.to_string()),
    }
}

#[cfg(feature = "postgres")]
fn postgres_execution_error(err: sqlx::Error) -> ExecutionError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ExecutionError::Connection(err.to_string()),
        sqlx::Error::Database(_) | sqlx::Error::ColumnDecode { .. } => {
            ExecutionError::Statement(err.to_string())
        }
        _ => ExecutionError::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_maps_to_statement() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.execute_batch("SELEC 1").unwrap_err();
        let mapped = ExecutionError::from(BackendError::from(err));
        assert!(matches!(mapped, ExecutionError::Statement(_)));
    }

    #[test]
    fn test_config_maps_to_other() {
        let mapped = ExecutionError::from(BackendError::Config("no url".to_string()));
        assert_eq!(mapped, ExecutionError::Other("no url".to_string()));
    }
}
