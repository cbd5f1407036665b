//! Event Repository
//!
//! Append-only history of the events of each run. The full event is kept as
//! JSON; the type and timestamp columns exist for querying.

use dcd_core::Event;
use sqlx::SqlitePool;

/// Append an event to the history of a run
pub async fn insert(
    pool: &SqlitePool,
    build_id: i64,
    event: &Event,
    payload: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pipeline_events (build_id, timestamp, event_type, payload)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(build_id)
    .bind(event.timestamp)
    .bind(event.type_name())
    .bind(payload)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the serialized events of a run, in insertion order
pub async fn find_payloads_by_build(
    pool: &SqlitePool,
    build_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT payload
        FROM pipeline_events
        WHERE build_id = ?1
        ORDER BY id ASC
        "#,
    )
    .bind(build_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Get event count for a run
pub async fn count_by_build(pool: &SqlitePool, build_id: i64) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pipeline_events WHERE build_id = ?1")
        .bind(build_id)
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}
