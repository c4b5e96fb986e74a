//! Event repository for PostgreSQL operations

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::core::constants::POSTGRES_INSERT_CHUNK;
use crate::data::postgres::PostgresError;
use crate::data::types::{EventSample, NewEvent};

/// Insert a batch of events atomically
pub async fn insert_events(pool: &PgPool, events: &[NewEvent]) -> Result<u64, PostgresError> {
    if events.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut written = 0;

    for chunk in events.chunks(POSTGRES_INSERT_CHUNK) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO events (created_at, expires_at, tenant, project, route, method, status, duration_ms, remote_ip, attributes) ",
        );
        builder.push_values(chunk, |mut row, event| {
            row.push_bind(event.created_at)
                .push_bind(event.expires_at)
                .push_bind(event.tenant.as_str())
                .push_bind(event.project.as_str())
                .push_bind(event.route.as_str())
                .push_bind(event.method.as_str())
                .push_bind(event.status)
                .push_bind(event.duration_ms)
                .push_bind(event.remote_ip.as_str())
                .push_bind(event.attributes.as_str());
        });
        written += builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Load the aggregation projection of events in `[start, end)`
pub async fn load_window(
    pool: &PgPool,
    start: i64,
    end: i64,
) -> Result<Vec<EventSample>, PostgresError> {
    let rows = sqlx::query_as::<_, (String, String, i32, i64)>(
        r#"SELECT tenant, project, status, duration_ms
           FROM events
           WHERE created_at >= $1 AND created_at < $2"#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(tenant, project, status, duration_ms)| EventSample {
            tenant,
            project,
            status,
            duration_ms,
        })
        .collect())
}

/// Delete events whose expiry has passed
pub async fn delete_expired(pool: &PgPool, now: i64) -> Result<u64, PostgresError> {
    let result =
        sqlx::query("DELETE FROM events WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}
