//! Metric bucket repository for SQLite operations

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::MetricBucket;

/// Insert or overwrite the bucket for (tenant, project, bucket_start)
pub async fn upsert_bucket(pool: &SqlitePool, bucket: &MetricBucket) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp_micros();

    sqlx::query(
        r#"INSERT INTO metric_buckets
               (tenant, project, bucket_start, total_count, error_count, p50_ms, p95_ms, p99_ms, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(tenant, project, bucket_start) DO UPDATE SET
               total_count = excluded.total_count,
               error_count = excluded.error_count,
               p50_ms = excluded.p50_ms,
               p95_ms = excluded.p95_ms,
               p99_ms = excluded.p99_ms,
               updated_at = excluded.updated_at"#,
    )
    .bind(&bucket.tenant)
    .bind(&bucket.project)
    .bind(bucket.bucket_start)
    .bind(bucket.total_count)
    .bind(bucket.error_count)
    .bind(bucket.p50_ms)
    .bind(bucket.p95_ms)
    .bind(bucket.p99_ms)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// List a project's buckets starting at or after `since`, oldest first
pub async fn list_buckets(
    pool: &SqlitePool,
    tenant: &str,
    project: &str,
    since: i64,
) -> Result<Vec<MetricBucket>, SqliteError> {
    let rows = sqlx::query_as::<_, (String, String, i64, i64, i64, i64, i64, i64)>(
        r#"SELECT tenant, project, bucket_start, total_count, error_count, p50_ms, p95_ms, p99_ms
           FROM metric_buckets
           WHERE tenant = ? AND project = ? AND bucket_start >= ?
           ORDER BY bucket_start ASC"#,
    )
    .bind(tenant)
    .bind(project)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(tenant, project, bucket_start, total_count, error_count, p50_ms, p95_ms, p99_ms)| {
                MetricBucket {
                    tenant,
                    project,
                    bucket_start,
                    total_count,
                    error_count,
                    p50_ms,
                    p95_ms,
                    p99_ms,
                }
            },
        )
        .collect())
}
