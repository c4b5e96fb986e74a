//! Unified error type for the data layer
//!
//! Wraps backend-specific errors while preserving which backend produced them.

use thiserror::Error;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    /// PostgreSQL database error
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// Migration failed
    #[error("Migration {version} ({name}) failed on {backend}: {error}")]
    MigrationFailed {
        backend: &'static str,
        version: i32,
        name: String,
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Get the backend name that generated this error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
            Self::MigrationFailed { backend, .. } => backend,
            Self::Config(_) | Self::Io(_) => "unknown",
        }
    }
}

impl From<crate::data::sqlite::SqliteError> for DataError {
    fn from(e: crate::data::sqlite::SqliteError) -> Self {
        use crate::data::sqlite::SqliteError;
        match e {
            SqliteError::Database(e) => Self::Sqlite(e),
            SqliteError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "sqlite",
                version,
                name,
                error,
            },
            SqliteError::Io(e) => Self::Io(e),
        }
    }
}

impl From<crate::data::postgres::PostgresError> for DataError {
    fn from(e: crate::data::postgres::PostgresError) -> Self {
        use crate::data::postgres::PostgresError;
        match e {
            PostgresError::Database(e) => Self::Postgres(e),
            PostgresError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "postgres",
                version,
                name,
                error,
            },
            PostgresError::Config(msg) => Self::Config(msg),
            PostgresError::Io(e) => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sqlite_error_keeps_backend() {
        let err: DataError = crate::data::sqlite::SqliteError::Database(sqlx::Error::PoolClosed).into();
        assert_eq!(err.backend(), "sqlite");
    }

    #[test]
    fn test_from_postgres_migration_error_keeps_backend() {
        let err: DataError = crate::data::postgres::PostgresError::MigrationFailed {
            version: 2,
            name: "add_events_route_index".to_string(),
            error: "syntax error".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_events_route_index) failed on postgres: syntax error"
        );
        assert_eq!(err.backend(), "postgres");
    }
}
