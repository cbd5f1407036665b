//! Pipeline Repository
//!
//! Handles all database operations related to run states.

use chrono::{DateTime, Utc};
use dcd_core::{PipelineState, PipelineStatus};
use sqlx::SqlitePool;

/// Inserts or replaces the state of a run
pub async fn upsert(pool: &SqlitePool, state: &PipelineState) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pipelines (build_id, status, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (build_id) DO UPDATE SET
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(state.build_id)
    .bind(state.status.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Find the state of a run by build id
pub async fn find_by_build_id(
    pool: &SqlitePool,
    build_id: i64,
) -> Result<Option<PipelineRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT build_id, status, updated_at
        FROM pipelines
        WHERE build_id = ?1
        "#,
    )
    .bind(build_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// A stored run state with the time it was last written
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRecord {
    pub state: PipelineState,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    build_id: i64,
    status: String,
    updated_at: DateTime<Utc>,
}

impl From<PipelineRow> for PipelineRecord {
    fn from(row: PipelineRow) -> Self {
        PipelineRecord {
            state: PipelineState {
                build_id: row.build_id,
                status: PipelineStatus::from(row.status),
            },
            updated_at: row.updated_at,
        }
    }
}
