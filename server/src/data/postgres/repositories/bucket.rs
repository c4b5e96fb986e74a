//! Metric bucket repository for PostgreSQL operations

use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::MetricBucket;

/// Insert or overwrite the bucket for (tenant, project, bucket_start)
pub async fn upsert_bucket(pool: &PgPool, bucket: &MetricBucket) -> Result<(), PostgresError> {
    let now = chrono::Utc::now().timestamp_micros();

    sqlx::query(
        r#"INSERT INTO metric_buckets
               (tenant, project, bucket_start, total_count, error_count, p50_ms, p95_ms, p99_ms, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
           ON CONFLICT (tenant, project, bucket_start) DO UPDATE SET
               total_count = EXCLUDED.total_count,
               error_count = EXCLUDED.error_count,
               p50_ms = EXCLUDED.p50_ms,
               p95_ms = EXCLUDED.p95_ms,
               p99_ms = EXCLUDED.p99_ms,
               updated_at = EXCLUDED.updated_at"#,
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
    pool: &PgPool,
    tenant: &str,
    project: &str,
    since: i64,
) -> Result<Vec<MetricBucket>, PostgresError> {
    let rows = sqlx::query_as::<_, (String, String, i64, i64, i64, i64, i64, i64)>(
        r#"SELECT tenant, project, bucket_start, total_count, error_count, p50_ms, p95_ms, p99_ms
           FROM metric_buckets
           WHERE tenant = $1 AND project = $2 AND bucket_start >= $3
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
