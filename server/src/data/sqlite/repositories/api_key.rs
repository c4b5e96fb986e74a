//! API key repository for SQLite operations

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{ApiKeyRow, ApiKeyValidation, NewApiKey};

type ApiKeyTuple = (String, String, String, String, String, i64, bool, i64);

fn row_from_tuple(
    (id, tenant, name, environment, key_prefix, retention_days, active, created_at): ApiKeyTuple,
) -> ApiKeyRow {
    ApiKeyRow {
        id,
        tenant,
        name,
        environment,
        key_prefix,
        retention_days,
        active,
        created_at,
    }
}

/// Create a new active API key
pub async fn create_api_key(pool: &SqlitePool, key: &NewApiKey) -> Result<ApiKeyRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp_micros();
    let retention_days = i64::from(key.retention_days);

    sqlx::query(
        r#"INSERT INTO api_keys (id, tenant, name, environment, key_hash, key_prefix, retention_days, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&id)
    .bind(&key.tenant)
    .bind(&key.name)
    .bind(&key.environment)
    .bind(&key.key_hash)
    .bind(&key.key_prefix)
    .bind(retention_days)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ApiKeyRow {
        id,
        tenant: key.tenant.clone(),
        name: key.name.clone(),
        environment: key.environment.clone(),
        key_prefix: key.key_prefix.clone(),
        retention_days,
        active: true,
        created_at: now,
    })
}

/// Get validation info for an active key by hash
pub async fn get_by_hash(
    pool: &SqlitePool,
    key_hash: &str,
) -> Result<Option<ApiKeyValidation>, SqliteError> {
    let row = sqlx::query_as::<_, (String, String, String, String, i64)>(
        r#"SELECT id, tenant, name, environment, retention_days
           FROM api_keys WHERE key_hash = ? AND active = 1"#,
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(key_id, tenant, project, environment, retention_days)| ApiKeyValidation {
            key_id,
            tenant,
            project,
            environment,
            retention_days,
        },
    ))
}

/// List keys, optionally for one tenant (newest first)
pub async fn list_api_keys(
    pool: &SqlitePool,
    tenant: Option<&str>,
) -> Result<Vec<ApiKeyRow>, SqliteError> {
    let rows = sqlx::query_as::<_, ApiKeyTuple>(
        r#"SELECT id, tenant, name, environment, key_prefix, retention_days, active, created_at
           FROM api_keys
           WHERE ?1 IS NULL OR tenant = ?1
           ORDER BY created_at DESC, id"#,
    )
    .bind(tenant)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_from_tuple).collect())
}

/// Deactivate active keys whose display prefix starts with `prefix`
pub async fn deactivate_by_prefix(pool: &SqlitePool, prefix: &str) -> Result<u64, SqliteError> {
    if prefix.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"UPDATE api_keys SET active = 0
           WHERE active = 1 AND substr(key_prefix, 1, length(?1)) = ?1"#,
    )
    .bind(prefix)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Insert a key or re-own and re-activate the row holding the same hash
pub async fn ensure_api_key(pool: &SqlitePool, key: &NewApiKey) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp_micros();

    sqlx::query(
        r#"INSERT INTO api_keys (id, tenant, name, environment, key_hash, key_prefix, retention_days, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)
           ON CONFLICT(key_hash) DO UPDATE SET
               tenant = excluded.tenant,
               name = excluded.name,
               environment = excluded.environment,
               retention_days = excluded.retention_days,
               active = 1"#,
    )
    .bind(cuid2::create_id())
    .bind(&key.tenant)
    .bind(&key.name)
    .bind(&key.environment)
    .bind(&key.key_hash)
    .bind(&key.key_prefix)
    .bind(i64::from(key.retention_days))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}
