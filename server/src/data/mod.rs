//! Data storage layer
//!
//! - `sqlite` - embedded transactional database (default)
//! - `postgres` - pooled transactional database for shared deployments
//! - `traits` - the `EventRepository` interface both backends implement
//! - `types` - row types shared across backends
//! - `error` - unified error type for all backends

pub mod error;
pub mod postgres;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use postgres::PostgresService;
pub use sqlite::SqliteService;
pub use traits::EventRepository;
pub use types::{ApiKeyRow, ApiKeyValidation, EventSample, MetricBucket, NewApiKey, NewEvent};

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::{PostgresConfig, TransactionalBackend};
use crate::core::storage::AppStorage;

/// Transactional database service
///
/// Wraps the backend-specific service. Services are stored as Arc so the
/// repository trait object can share them.
pub enum TransactionalService {
    /// SQLite backend (default, embedded)
    Sqlite(Arc<SqliteService>),
    /// PostgreSQL backend
    Postgres(Arc<PostgresService>),
}

impl TransactionalService {
    /// Initialize the configured backend and run pending migrations
    pub async fn init(
        backend: TransactionalBackend,
        storage: &AppStorage,
        postgres_config: Option<&PostgresConfig>,
    ) -> Result<Self, DataError> {
        match backend {
            TransactionalBackend::Sqlite => {
                let service = SqliteService::init(storage).await?;
                Ok(Self::Sqlite(Arc::new(service)))
            }
            TransactionalBackend::Postgres => {
                let config = postgres_config.ok_or_else(|| {
                    DataError::Config("PostgreSQL configuration required".to_string())
                })?;
                let service = PostgresService::init(config).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    /// Run a WAL checkpoint (SQLite); PostgreSQL manages its own
    pub async fn checkpoint(&self) -> Result<(), DataError> {
        match self {
            Self::Sqlite(s) => s.checkpoint().await.map_err(Into::into),
            Self::Postgres(_) => Ok(()),
        }
    }

    /// Close the database connection gracefully
    pub async fn close(&self) {
        match self {
            Self::Sqlite(s) => s.close().await,
            Self::Postgres(p) => p.close().await,
        }
    }

    /// Start the WAL checkpoint task (SQLite) or health check task (PostgreSQL)
    pub fn start_checkpoint_task(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        match self {
            Self::Sqlite(s) => s.start_checkpoint_task(shutdown_rx),
            Self::Postgres(p) => p.start_health_check_task(shutdown_rx),
        }
    }

    /// Backend-agnostic repository for data operations
    pub fn repository(&self) -> Arc<dyn EventRepository> {
        match self {
            Self::Sqlite(s) => Arc::new(Arc::clone(s)),
            Self::Postgres(p) => Arc::new(Arc::clone(p)),
        }
    }
}
