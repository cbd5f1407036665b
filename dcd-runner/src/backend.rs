//! In-memory backend
//!
//! Keeps build ids, run states and event history in process memory. Useful
//! for one-off local runs and as the backend of choice in tests.

use async_trait::async_trait;
use dcd_core::backend::Result;
use dcd_core::{Backend, BackendError, Event, PipelineState};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// Process-local implementation of [`Backend`]
#[derive(Debug, Default)]
pub struct MemoryBackend {
    last_build_id: AtomicI64,
    states: Mutex<HashMap<i64, PipelineState>>,
    events: Mutex<Vec<(i64, Event)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last submitted state of a run
    pub fn state(&self, build_id: i64) -> Option<PipelineState> {
        self.states
            .lock()
            .ok()
            .and_then(|states| states.get(&build_id).cloned())
    }

    /// Recorded events of a run, in the order they were recorded
    pub fn events(&self, build_id: i64) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| {
                events
                    .iter()
                    .filter(|(id, _)| *id == build_id)
                    .map(|(_, event)| event.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> BackendError {
    BackendError::Storage("memory backend lock poisoned".to_string())
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn allocate_build_id(&self) -> Result<i64> {
        Ok(self.last_build_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn submit_pipeline_state(&self, state: &PipelineState) -> Result<()> {
        let mut states = self.states.lock().map_err(poisoned)?;
        states.insert(state.build_id, state.clone());
        Ok(())
    }

    async fn record_pipeline_event(&self, build_id: i64, event: &Event) -> Result<()> {
        let mut events = self.events.lock().map_err(poisoned)?;
        events.push((build_id, event.clone()));
        Ok(())
    }
}
