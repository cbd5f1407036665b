//! Backend contract
//!
//! A backend allocates build identifiers and persists run records. The
//! engine depends only on this trait; concrete stores live elsewhere.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::event::Event;
use crate::domain::state::PipelineState;

/// Errors raised by backend implementations
#[derive(Debug, Error)]
pub enum BackendError {
    /// The underlying store could not be reached or rejected the operation
    #[error("storage error: {0}")]
    Storage(String),

    /// The store answered with something that is not a valid record
    #[error("unexpected data in store: {0}")]
    InvalidData(String),

    /// A record could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Persistence contract used by pipeline runs
///
/// Implementations must be safe to share between concurrent runs.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Allocates the next build id
    ///
    /// Ids are strictly increasing per backend instance, start at 1 and are
    /// never handed out twice, even when the run that received one fails.
    async fn allocate_build_id(&self) -> Result<i64>;

    /// Stores the state of a run, replacing any earlier state for the same id
    async fn submit_pipeline_state(&self, state: &PipelineState) -> Result<()>;

    /// Appends an event to the durable history of a run
    ///
    /// Not called by the engine itself; callers forward the events they
    /// receive.
    async fn record_pipeline_event(&self, build_id: i64, event: &Event) -> Result<()>;

    /// Flushes and releases whatever the backend holds open
    async fn close(&self) {}
}
