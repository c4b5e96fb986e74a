//! API key repository for PostgreSQL operations

use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::{ApiKeyRow, ApiKeyValidation, NewApiKey};

/// Create a new active API key
pub async fn create_api_key(pool: &PgPool, key: &NewApiKey) -> Result<ApiKeyRow, PostgresError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp_micros();
    let retention_days = i64::from(key.retention_days);

    sqlx::query(
        r#"INSERT INTO api_keys (id, tenant, name, environment, key_hash, key_prefix, retention_days, active, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)"#,
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
    pool: &PgPool,
    key_hash: &str,
) -> Result<Option<ApiKeyValidation>, PostgresError> {
    let row = sqlx::query_as::<_, (String, String, String, String, i64)>(
        r#"SELECT id, tenant, name, environment, retention_days
           FROM api_keys WHERE key_hash = $1 AND active"#,
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
    pool: &PgPool,
    tenant: Option<&str>,
) -> Result<Vec<ApiKeyRow>, PostgresError> {
    let rows = sqlx::query_as::<_, (String, String, String, String, String, i64, bool, i64)>(
        r#"SELECT id, tenant, name, environment, key_prefix, retention_days, active, created_at
           FROM api_keys
           WHERE $1::TEXT IS NULL OR tenant = $1
           ORDER BY created_at DESC, id"#,
    )
    .bind(tenant)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, tenant, name, environment, key_prefix, retention_days, active, created_at)| {
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
            },
        )
        .collect())
}

/// Deactivate active keys whose display prefix starts with `prefix`
pub async fn deactivate_by_prefix(pool: &PgPool, prefix: &str) -> Result<u64, PostgresError> {
    if prefix.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE api_keys SET active = FALSE WHERE active AND starts_with(key_prefix, $1)",
    )
    .bind(prefix)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Insert a key or re-own and re-activate the row holding the same hash
pub async fn ensure_api_key(pool: &PgPool, key: &NewApiKey) -> Result<(), PostgresError> {
    let now = chrono::Utc::now().timestamp_micros();

    sqlx::query(
        r#"INSERT INTO api_keys (id, tenant, name, environment, key_hash, key_prefix, retention_days, active, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
           ON CONFLICT (key_hash) DO UPDATE SET
               tenant = EXCLUDED.tenant,
               name = EXCLUDED.name,
               environment = EXCLUDED.environment,
               retention_days = EXCLUDED.retention_days,
               active = TRUE"#,
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
