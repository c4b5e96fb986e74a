//! PostgreSQL schema definitions
//!
//! Mirrors the SQLite schema; timestamps are BIGINT UTC microseconds.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL for PostgreSQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at BIGINT NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms BIGINT,
    success BOOLEAN NOT NULL DEFAULT TRUE
);

-- =============================================================================
-- 1. Events
-- =============================================================================
CREATE TABLE IF NOT EXISTS events (
    id BIGSERIAL PRIMARY KEY,
    created_at BIGINT NOT NULL,
    expires_at BIGINT,
    tenant TEXT NOT NULL,
    project TEXT NOT NULL,
    route TEXT NOT NULL CHECK (length(route) >= 1),
    method TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 0,
    duration_ms BIGINT NOT NULL DEFAULT 0,
    remote_ip TEXT NOT NULL DEFAULT '',
    attributes TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_events_expires_at ON events(expires_at) WHERE expires_at IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_events_tenant_project_created ON events(tenant, project, created_at);
CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);

-- =============================================================================
-- 2. Metric buckets
-- =============================================================================
CREATE TABLE IF NOT EXISTS metric_buckets (
    id BIGSERIAL PRIMARY KEY,
    tenant TEXT NOT NULL,
    project TEXT NOT NULL,
    bucket_start BIGINT NOT NULL,
    total_count BIGINT NOT NULL,
    error_count BIGINT NOT NULL,
    p50_ms BIGINT NOT NULL,
    p95_ms BIGINT NOT NULL,
    p99_ms BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    UNIQUE (tenant, project, bucket_start)
);

-- =============================================================================
-- 3. API keys
-- =============================================================================
CREATE TABLE IF NOT EXISTS api_keys (
    id TEXT PRIMARY KEY,
    tenant TEXT NOT NULL,
    name TEXT NOT NULL CHECK (length(name) >= 1),
    environment TEXT NOT NULL,
    key_hash TEXT NOT NULL UNIQUE,
    key_prefix TEXT NOT NULL,
    retention_days BIGINT NOT NULL DEFAULT 0 CHECK (retention_days >= 0),
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_api_keys_tenant ON api_keys(tenant);
CREATE INDEX IF NOT EXISTS idx_api_keys_prefix ON api_keys(key_prefix);
"#;
