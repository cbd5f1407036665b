//! Counter Repository
//!
//! Named monotonically increasing counters.

use sqlx::SqlitePool;

/// Counter used for build ids
pub const BUILD_ID_COUNTER: &str = "build_id";

/// Increments the counter `name` and returns its new value
///
/// A missing counter starts at 1. The read and the write are one statement,
/// so concurrent callers always receive distinct values.
pub async fn increment(pool: &SqlitePool, name: &str) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO build_counter (name, value)
        VALUES (?1, 1)
        ON CONFLICT (name) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Current value of the counter `name`, if it was ever incremented
pub async fn current(pool: &SqlitePool, name: &str) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT value FROM build_counter WHERE name = ?1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.0))
}
