// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "ApiInsight";

/// Application name in lowercase (for paths, identifiers and metric namespace)
pub const APP_NAME_LOWER: &str = "apiinsight";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".apiinsight";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "apiinsight.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "APIINSIGHT_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "APIINSIGHT_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "APIINSIGHT_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "APIINSIGHT_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "APIINSIGHT_DATA_DIR";

/// Environment variable for the transactional backend (sqlite or postgres)
pub const ENV_DATABASE_BACKEND: &str = "APIINSIGHT_DATABASE_BACKEND";

/// Environment variable for the PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "APIINSIGHT_POSTGRES_URL";

// =============================================================================
// Retention
// =============================================================================

/// Environment variable for the global retention default and ceiling (days)
pub const ENV_RETENTION_DAYS: &str = "APIINSIGHT_RETENTION_DAYS";

/// Default global retention in days (0 disables expiry)
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Retention sweep interval (24 hours)
pub const RETENTION_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

// =============================================================================
// Aggregation
// =============================================================================

/// Aggregation interval (1 hour)
pub const AGGREGATION_INTERVAL_SECS: u64 = 60 * 60;

/// Completed hours recomputed at startup
pub const DEFAULT_AGGREGATION_CATCHUP_HOURS: u32 = 24;

/// Status code from which an event counts as an error
pub const ERROR_STATUS_THRESHOLD: i32 = 400;

// =============================================================================
// Live Metrics
// =============================================================================

/// Counter of ingested requests, labeled project/route/method/status
pub const METRIC_REQUESTS_TOTAL: &str = "requests_total";

/// Histogram of ingested request durations, labeled project/route/method
pub const METRIC_REQUEST_DURATION_SECONDS: &str = "request_duration_seconds";

/// Histogram upper bounds in seconds
pub const DURATION_BUCKETS_SECS: [f64; 10] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0];

// =============================================================================
// API Keys
// =============================================================================

/// API key prefix
pub const API_KEY_PREFIX: &str = "ak-";

/// Random part length of generated API keys
pub const API_KEY_RANDOM_LENGTH: usize = 40;

/// Characters shown when listing keys
pub const API_KEY_PREFIX_DISPLAY_LEN: usize = 10;

/// Environment variable for the HMAC secret used to hash API keys
pub const ENV_API_KEY_SECRET: &str = "APIINSIGHT_API_KEY_SECRET";

/// File (inside the data dir) holding the generated HMAC secret
pub const API_KEY_SECRET_FILENAME: &str = "api_key_secret";

/// HMAC secret length in bytes when generated
pub const API_KEY_SECRET_BYTES: usize = 32;

// =============================================================================
// Self-Reporting
// =============================================================================

/// Environment variable for the internal API key used for self-reporting
pub const ENV_INTERNAL_API_KEY: &str = "APIINSIGHT_INTERNAL_API_KEY";

/// Environment variable for the tenant owning the internal API key
pub const ENV_INTERNAL_TENANT: &str = "APIINSIGHT_INTERNAL_TENANT";

/// Default tenant owning the internal API key
pub const DEFAULT_INTERNAL_TENANT: &str = "admin";

/// Project name of the internal API key
pub const INTERNAL_PROJECT_NAME: &str = "api-insight";

/// Environment label of the internal API key
pub const INTERNAL_ENVIRONMENT: &str = "internal";

/// Maximum concurrent self-report submissions
pub const DEFAULT_REPORTING_CONCURRENCY: usize = 4;

/// Per-submission timeout in milliseconds
pub const DEFAULT_REPORTING_TIMEOUT_MS: u64 = 2000;

/// Pending self-report queue capacity
pub const DEFAULT_REPORTING_QUEUE_CAPACITY: usize = 1024;

/// Paths never self-reported
pub const REPORTING_SKIP_PATHS: &[&str] = &["/v1/events", "/v1/metrics", "/metrics", "/healthz", "/login"];

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "apiinsight.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

/// Rows per INSERT statement when writing event batches
pub const SQLITE_INSERT_CHUNK: usize = 500;

// =============================================================================
// PostgreSQL Database
// =============================================================================

pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

/// Rows per INSERT statement when writing event batches
pub const POSTGRES_INSERT_CHUNK: usize = 1000;

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for general API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Body limit for event ingestion (16 MB)
pub const INGEST_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Maximum events accepted in one ingestion request
pub const MAX_EVENTS_PER_BATCH: usize = 10_000;

// =============================================================================
// Bucket Read-out
// =============================================================================

/// Default look-back for bucket queries (hours)
pub const DEFAULT_BUCKET_LOOKBACK_HOURS: u32 = 24;

/// Maximum look-back for bucket queries (30 days)
pub const MAX_BUCKET_LOOKBACK_HOURS: u32 = 720;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for background tasks on shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
