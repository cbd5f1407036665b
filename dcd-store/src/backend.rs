//! SQLite backend
//!
//! Durable [`Backend`] implementation: build ids come from a counter row,
//! run states and event history live in their own tables.

use async_trait::async_trait;
use dcd_core::backend::Result;
use dcd_core::{Backend, BackendError, Event, PipelineState};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db;
use crate::repository::counter::BUILD_ID_COUNTER;
use crate::repository::pipeline::PipelineRecord;
use crate::repository::{counter_repository, event_repository, pipeline_repository};

/// [`Backend`] persisted in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Opens `database_url` and brings its schema up to date
    pub async fn connect(database_url: &str) -> std::result::Result<Self, sqlx::Error> {
        info!("Opening state database {}", database_url);
        let pool = db::create_pool(database_url).await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, running migrations first
    pub async fn from_pool(pool: SqlitePool) -> std::result::Result<Self, sqlx::Error> {
        db::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Last submitted state of a run
    pub async fn find_pipeline(&self, build_id: i64) -> Result<Option<PipelineRecord>> {
        pipeline_repository::find_by_build_id(&self.pool, build_id)
            .await
            .map_err(storage)
    }

    /// Recorded events of a run, in the order they were recorded
    pub async fn list_events(&self, build_id: i64) -> Result<Vec<Event>> {
        let payloads = event_repository::find_payloads_by_build(&self.pool, build_id)
            .await
            .map_err(storage)?;

        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(BackendError::from))
            .collect()
    }
}

fn storage(e: sqlx::Error) -> BackendError {
    BackendError::Storage(e.to_string())
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn allocate_build_id(&self) -> Result<i64> {
        let build_id = counter_repository::increment(&self.pool, BUILD_ID_COUNTER)
            .await
            .map_err(storage)?;

        if build_id < 1 {
            return Err(BackendError::InvalidData(format!(
                "build counter returned {}",
                build_id
            )));
        }

        debug!("Allocated build id {}", build_id);
        Ok(build_id)
    }

    async fn submit_pipeline_state(&self, state: &PipelineState) -> Result<()> {
        debug!("Storing state {} for build {}", state.status, state.build_id);
        pipeline_repository::upsert(&self.pool, state)
            .await
            .map_err(storage)
    }

    async fn record_pipeline_event(&self, build_id: i64, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        event_repository::insert(&self.pool, build_id, event, &payload)
            .await
            .map_err(storage)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
