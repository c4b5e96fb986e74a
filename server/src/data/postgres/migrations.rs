//! PostgreSQL migration management

use sqlx::PgPool;

use super::error::PostgresError;
use super::schema::{SCHEMA, SCHEMA_VERSION};
use crate::utils::crypto::sha256_hex;

/// Run all pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), PostgresError> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = 'schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        tracing::debug!("Applying initial PostgreSQL schema v{}", SCHEMA_VERSION);
        apply_initial_schema(pool).await?;
        return Ok(());
    }

    let current_version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    match current_version {
        None => {
            tracing::debug!("Applying initial PostgreSQL schema v{}", SCHEMA_VERSION);
            apply_initial_schema(pool).await?;
        }
        Some(v) if v < SCHEMA_VERSION => {
            tracing::debug!(
                "Migrating PostgreSQL schema from v{} to v{}",
                v,
                SCHEMA_VERSION
            );
            for version in (v + 1)..=SCHEMA_VERSION {
                apply_versioned_migration(pool, version).await?;
            }
        }
        Some(v) if v > SCHEMA_VERSION => {
            tracing::warn!(
                "PostgreSQL schema version {} is newer than application version {}. This may cause issues.",
                v,
                SCHEMA_VERSION
            );
        }
        _ => {
            tracing::debug!("PostgreSQL schema is up to date (v{})", SCHEMA_VERSION);
        }
    }

    Ok(())
}

/// Apply the initial schema in one transaction
async fn apply_initial_schema(pool: &PgPool) -> Result<(), PostgresError> {
    let start = std::time::Instant::now();
    let mut tx = pool.begin().await?;

    sqlx::raw_sql(SCHEMA).execute(&mut *tx).await?;

    let now = chrono::Utc::now().timestamp_micros();
    sqlx::query(
        "INSERT INTO schema_version (id, version, applied_at, description)
         VALUES (1, $1, $2, 'Initial schema')
         ON CONFLICT (id) DO UPDATE SET version = $1, applied_at = $2",
    )
    .bind(SCHEMA_VERSION)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let elapsed = start.elapsed().as_millis() as i64;
    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success)
         VALUES ($1, 'initial_schema', $2, $3, $4, TRUE)
         ON CONFLICT (version) DO NOTHING",
    )
    .bind(SCHEMA_VERSION)
    .bind(now)
    .bind(sha256_hex(SCHEMA))
    .bind(elapsed)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!("PostgreSQL schema v{} applied in {}ms", SCHEMA_VERSION, elapsed);
    Ok(())
}

/// Apply a specific versioned migration
///
/// Add new migrations as match arms returning their name and SQL.
async fn apply_versioned_migration(pool: &PgPool, version: i32) -> Result<(), PostgresError> {
    let (name, sql): (&str, &str) = match version {
        1 => ("initial_schema", SCHEMA),
        _ => {
            return Err(PostgresError::MigrationFailed {
                version,
                name: "unknown".to_string(),
                error: format!("No migration defined for version {}", version),
            });
        }
    };

    let start = std::time::Instant::now();
    let mut tx = pool.begin().await?;

    sqlx::raw_sql(sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| PostgresError::MigrationFailed {
            version,
            name: name.to_string(),
            error: e.to_string(),
        })?;

    let now = chrono::Utc::now().timestamp_micros();
    let elapsed = start.elapsed().as_millis() as i64;

    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success)
         VALUES ($1, $2, $3, $4, $5, TRUE)
         ON CONFLICT (version) DO UPDATE SET applied_at = $3, checksum = $4, execution_time_ms = $5",
    )
    .bind(version)
    .bind(name)
    .bind(now)
    .bind(sha256_hex(sql))
    .bind(elapsed)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE schema_version SET version = $1, applied_at = $2, description = $3 WHERE id = 1")
        .bind(version)
        .bind(now)
        .bind(name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(
        "PostgreSQL migration v{} ({}) applied in {}ms",
        version,
        name,
        elapsed
    );
    Ok(())
}
