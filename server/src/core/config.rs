use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_AGGREGATION_CATCHUP_HOURS, DEFAULT_HOST,
    DEFAULT_INTERNAL_TENANT, DEFAULT_PORT, DEFAULT_REPORTING_CONCURRENCY,
    DEFAULT_REPORTING_QUEUE_CAPACITY, DEFAULT_REPORTING_TIMEOUT_MS, DEFAULT_RETENTION_DAYS,
    ENV_POSTGRES_URL, POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
    POSTGRES_DEFAULT_MIN_CONNECTIONS, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

// =============================================================================
// Transactional Backend Enum
// =============================================================================

/// Database backend holding events, buckets and API keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionalBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for TransactionalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionalBackend::Sqlite => write!(f, "sqlite"),
            TransactionalBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Retention configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RetentionFileConfig {
    /// Global default and ceiling in days (0 = keep forever)
    pub days: Option<u32>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use APIINSIGHT_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    /// Backend: sqlite (default) or postgres
    pub backend: Option<TransactionalBackend>,
    pub postgres: Option<PostgresFileConfig>,
}

/// Aggregation configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AggregationFileConfig {
    /// Completed hours recomputed at startup
    pub catchup_hours: Option<u32>,
}

/// Self-reporting configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReportingFileConfig {
    pub internal_api_key: Option<String>,
    pub internal_tenant: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub retention: Option<RetentionFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    pub aggregation: Option<AggregationFileConfig>,
    pub reporting: Option<ReportingFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                current.host = server.host;
            }
            if server.port.is_some() {
                current.port = server.port;
            }
        }

        if let Some(retention) = other.retention {
            let current = self
                .retention
                .get_or_insert_with(RetentionFileConfig::default);
            if retention.days.is_some() {
                tracing::trace!(days = ?retention.days, "Merging retention.days");
                current.days = retention.days;
            }
        }

        if let Some(database) = other.database {
            let current = self
                .database
                .get_or_insert_with(DatabaseFileConfig::default);
            if database.backend.is_some() {
                current.backend = database.backend;
            }
            if let Some(pg) = database.postgres {
                let current_pg = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                if pg.url.is_some() {
                    current_pg.url = pg.url;
                }
                if pg.max_connections.is_some() {
                    current_pg.max_connections = pg.max_connections;
                }
                if pg.min_connections.is_some() {
                    current_pg.min_connections = pg.min_connections;
                }
                if pg.acquire_timeout_secs.is_some() {
                    current_pg.acquire_timeout_secs = pg.acquire_timeout_secs;
                }
                if pg.idle_timeout_secs.is_some() {
                    current_pg.idle_timeout_secs = pg.idle_timeout_secs;
                }
                if pg.max_lifetime_secs.is_some() {
                    current_pg.max_lifetime_secs = pg.max_lifetime_secs;
                }
                if pg.statement_timeout_secs.is_some() {
                    current_pg.statement_timeout_secs = pg.statement_timeout_secs;
                }
            }
        }

        if let Some(aggregation) = other.aggregation {
            let current = self
                .aggregation
                .get_or_insert_with(AggregationFileConfig::default);
            if aggregation.catchup_hours.is_some() {
                current.catchup_hours = aggregation.catchup_hours;
            }
        }

        if let Some(reporting) = other.reporting {
            let current = self
                .reporting
                .get_or_insert_with(ReportingFileConfig::default);
            if reporting.internal_api_key.is_some() {
                current.internal_api_key = reporting.internal_api_key;
            }
            if reporting.internal_tenant.is_some() {
                current.internal_tenant = reporting.internal_tenant;
            }
            if reporting.concurrency.is_some() {
                current.concurrency = reporting.concurrency;
            }
            if reporting.timeout_ms.is_some() {
                current.timeout_ms = reporting.timeout_ms;
            }
            if reporting.queue_capacity.is_some() {
                current.queue_capacity = reporting.queue_capacity;
            }
        }

        // Unknown fields accumulate so each file is warned about once
        if let serde_json::Value::Object(extra) = other.extra
            && !extra.is_empty()
        {
            if let serde_json::Value::Object(current) = &mut self.extra {
                current.extend(extra);
            } else {
                self.extra = serde_json::Value::Object(extra);
            }
        }
    }
}

// =============================================================================
// Runtime Config Structs
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Global default and ceiling in days (0 = keep forever)
    pub days: u32,
}

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to keep warm
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
    /// Max connection lifetime in seconds
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: TransactionalBackend,
    /// Populated only for the postgres backend
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub catchup_hours: u32,
}

#[derive(Debug, Clone)]
pub struct ReportingConfig {
    /// Self-reporting is disabled when unset
    pub internal_api_key: Option<String>,
    pub internal_tenant: String,
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub queue_capacity: usize,
}

impl ReportingConfig {
    pub fn is_enabled(&self) -> bool {
        self.internal_api_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub retention: RetentionConfig,
    pub database: DatabaseConfig,
    pub aggregation: AggregationConfig,
    pub reporting: ReportingConfig,
    /// Hex secret for API key hashing; generated on first start when unset
    pub api_key_secret: Option<String>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.apiinsight/apiinsight.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(cli, file_config);
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            retention_days = config.retention.days,
            backend = %config.database.backend,
            self_reporting = config.reporting.is_enabled(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn from_layers(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_retention = file_config.retention.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();
        let file_aggregation = file_config.aggregation.unwrap_or_default();
        let file_reporting = file_config.reporting.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let retention_days = cli
            .retention_days
            .or(file_retention.days)
            .unwrap_or(DEFAULT_RETENTION_DAYS);

        let backend = cli
            .database_backend
            .or(file_database.backend)
            .unwrap_or_default();

        // PostgreSQL config (only populated if using postgres backend)
        let postgres = if backend == TransactionalBackend::Postgres {
            let file_pg = file_database.postgres.unwrap_or_default();
            let url = cli
                .postgres_url
                .clone()
                .or_else(|| std::env::var(ENV_POSTGRES_URL).ok())
                .or(file_pg.url)
                .unwrap_or_default();
            Some(PostgresConfig {
                url,
                max_connections: file_pg
                    .max_connections
                    .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
                min_connections: file_pg
                    .min_connections
                    .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
                acquire_timeout_secs: file_pg
                    .acquire_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
                idle_timeout_secs: file_pg
                    .idle_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: file_pg
                    .max_lifetime_secs
                    .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
                statement_timeout_secs: file_pg
                    .statement_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
            })
        } else {
            None
        };

        // Empty strings from env count as unset
        let internal_api_key = cli
            .internal_api_key
            .clone()
            .or(file_reporting.internal_api_key)
            .filter(|k| !k.trim().is_empty());

        let reporting = ReportingConfig {
            internal_api_key,
            internal_tenant: cli
                .internal_tenant
                .clone()
                .or(file_reporting.internal_tenant)
                .unwrap_or_else(|| DEFAULT_INTERNAL_TENANT.to_string()),
            concurrency: file_reporting
                .concurrency
                .unwrap_or(DEFAULT_REPORTING_CONCURRENCY),
            timeout_ms: file_reporting
                .timeout_ms
                .unwrap_or(DEFAULT_REPORTING_TIMEOUT_MS),
            queue_capacity: file_reporting
                .queue_capacity
                .unwrap_or(DEFAULT_REPORTING_QUEUE_CAPACITY),
        };

        Self {
            server: ServerConfig { host, port },
            retention: RetentionConfig {
                days: retention_days,
            },
            database: DatabaseConfig { backend, postgres },
            aggregation: AggregationConfig {
                catchup_hours: file_aggregation
                    .catchup_hours
                    .unwrap_or(DEFAULT_AGGREGATION_CATCHUP_HOURS),
            },
            reporting,
            api_key_secret: cli
                .api_key_secret
                .clone()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.database.backend == TransactionalBackend::Postgres
            && self
                .database
                .postgres
                .as_ref()
                .is_none_or(|p| p.url.is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.postgres.url is required when database.backend is 'postgres'. \
                 Set via {} env var or database.postgres.url in config file.",
                ENV_POSTGRES_URL
            );
        }

        if self.aggregation.catchup_hours == 0 {
            anyhow::bail!("Configuration error: aggregation.catchup_hours must be greater than 0");
        }

        if self.reporting.concurrency == 0 {
            anyhow::bail!("Configuration error: reporting.concurrency must be greater than 0");
        }

        if self.reporting.queue_capacity == 0 {
            anyhow::bail!("Configuration error: reporting.queue_capacity must be greater than 0");
        }

        if self.retention.days == 0 {
            tracing::warn!("Global retention is 0: events never expire unless a key sets its own retention");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.apiinsight/apiinsight.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transactional_backend_serde() {
        let backend: TransactionalBackend = serde_json::from_str(r#""postgres""#).unwrap();
        assert_eq!(backend, TransactionalBackend::Postgres);
        assert_eq!(TransactionalBackend::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 9000 },
            "retention": { "days": 14 },
            "database": { "backend": "sqlite" },
            "aggregation": { "catchup_hours": 48 },
            "reporting": { "concurrency": 2, "timeout_ms": 500 }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("0.0.0.0".to_string())
        );
        assert_eq!(config.retention.as_ref().unwrap().days, Some(14));
        assert_eq!(config.aggregation.as_ref().unwrap().catchup_hours, Some(48));
        assert_eq!(config.reporting.as_ref().unwrap().timeout_ms, Some(500));
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "retention": { "days": 7 }, "retension": 3 }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        let extra = config.extra.as_object().unwrap();
        assert!(extra.contains_key("retension"));
    }

    #[test]
    fn test_file_config_merge() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{ "server": { "host": "a", "port": 1 }, "retention": { "days": 10 } }"#,
        )
        .unwrap();
        let overlay: FileConfig =
            serde_json::from_str(r#"{ "server": { "port": 2 }, "retention": { "days": 5 } }"#)
                .unwrap();
        base.merge(overlay);

        let server = base.server.unwrap();
        assert_eq!(server.host, Some("a".to_string()));
        assert_eq!(server.port, Some(2));
        assert_eq!(base.retention.unwrap().days, Some(5));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_layers(&CliConfig::default(), FileConfig::default());

        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.retention.days, DEFAULT_RETENTION_DAYS);
        assert_eq!(config.database.backend, TransactionalBackend::Sqlite);
        assert!(config.database.postgres.is_none());
        assert_eq!(
            config.aggregation.catchup_hours,
            DEFAULT_AGGREGATION_CATCHUP_HOURS
        );
        assert!(!config.reporting.is_enabled());
        assert_eq!(config.reporting.internal_tenant, DEFAULT_INTERNAL_TENANT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{ "server": { "port": 9000 }, "retention": { "days": 14 } }"#,
        )
        .unwrap();
        let cli = CliConfig {
            port: Some(3000),
            retention_days: Some(90),
            internal_api_key: Some("ak-internal".to_string()),
            ..Default::default()
        };
        let config = AppConfig::from_layers(&cli, file);

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.retention.days, 90);
        assert!(config.reporting.is_enabled());
    }

    #[test]
    fn test_blank_internal_key_disables_reporting() {
        let cli = CliConfig {
            internal_api_key: Some("  ".to_string()),
            ..Default::default()
        };
        let config = AppConfig::from_layers(&cli, FileConfig::default());
        assert!(!config.reporting.is_enabled());
    }

    #[test]
    fn test_validate_rejects_postgres_without_url() {
        let cli = CliConfig {
            database_backend: Some(TransactionalBackend::Postgres),
            postgres_url: Some(String::new()),
            ..Default::default()
        };
        let mut config = AppConfig::from_layers(&cli, FileConfig::default());
        // The env fallback may be set on the host running the tests
        if let Some(pg) = config.database.postgres.as_mut() {
            pg.url.clear();
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let cli = CliConfig {
            port: Some(0),
            ..Default::default()
        };
        let config = AppConfig::from_layers(&cli, FileConfig::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(!is_all_interfaces("127.0.0.1"));
    }
}
