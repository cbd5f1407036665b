//! Run orchestrator
//!
//! Drives a single pipeline run:
//! - Runs the pre-flight checks
//! - Allocates a build id and records the pending state with the backend
//! - Executes the steps one by one on a background task
//! - Streams every lifecycle and output event through one bounded channel
//!
//! Anything that fails before the channel exists is returned as a
//! [`RunError`]. Once the run is streaming, failures are reported as events
//! and the stream always ends with exactly one terminal event.

use dcd_core::{Backend, BackendError, Event, Metadata, PipelineDefinition, PipelineState};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigError};
use crate::preflight::{self, Preflight, PreflightError};
use crate::step::StepRunner;

/// Errors that prevent a run from starting
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error("failed to get build ID: {0}")]
    AllocateBuildId(#[source] BackendError),

    #[error("failed to put pipeline: {0}")]
    SubmitState(#[source] BackendError),
}

/// A pipeline ready to be run
///
/// Holds everything a run needs; nothing is shared between runs except the
/// backend, so several pipelines can run side by side.
pub struct Pipeline {
    definition: Arc<PipelineDefinition>,
    metadata: Metadata,
    backend: Arc<dyn Backend>,
    preflight: Arc<dyn Preflight>,
    config: Config,
}

impl Pipeline {
    pub fn new(
        definition: PipelineDefinition,
        metadata: Metadata,
        backend: Arc<dyn Backend>,
        preflight: Arc<dyn Preflight>,
    ) -> Self {
        Self {
            definition: Arc::new(definition),
            metadata,
            backend,
            preflight,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Starts a run
    ///
    /// Returns once the build id is allocated and recorded; the steps then
    /// execute in the background while events are read from the returned
    /// [`PipelineRun`].
    pub async fn run(&self) -> Result<PipelineRun, RunError> {
        self.config.validate()?;

        preflight::run_checks(self.preflight.as_ref(), &self.config).await?;

        let build_id = self
            .backend
            .allocate_build_id()
            .await
            .map_err(RunError::AllocateBuildId)?;
        info!("Allocated build {} for {}", build_id, self.metadata.component);

        self.backend
            .submit_pipeline_state(&PipelineState::pending(build_id))
            .await
            .map_err(RunError::SubmitState)?;

        let env = run_environment(
            inherited_environment(),
            &self.definition.global_env,
            &self.metadata,
            build_id,
        );

        let (sender, receiver) = mpsc::channel(self.config.event_buffer);
        let execution = Execution {
            build_id,
            definition: Arc::clone(&self.definition),
            env,
            runner: StepRunner::new(&self.config),
            events: sender,
        };
        tokio::spawn(execution.run());

        Ok(PipelineRun {
            build_id,
            events: receiver,
        })
    }
}

/// Handle on a started run
#[derive(Debug)]
pub struct PipelineRun {
    build_id: i64,
    events: mpsc::Receiver<Event>,
}

impl PipelineRun {
    pub fn build_id(&self) -> i64 {
        self.build_id
    }

    /// Next event, or `None` once the terminal event has been received
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Waits for the run to finish and returns every event it produced
    pub async fn collect(mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        events
    }

    pub fn into_receiver(self) -> mpsc::Receiver<Event> {
        self.events
    }
}

/// State owned by the background task of one run
struct Execution {
    build_id: i64,
    definition: Arc<PipelineDefinition>,
    env: Vec<String>,
    runner: StepRunner,
    events: mpsc::Sender<Event>,
}

impl Execution {
    async fn run(self) {
        if !self.emit(Event::pipeline_start(self.build_id)).await {
            return;
        }

        let total = self.definition.steps.len();
        for (idx, step) in self.definition.steps.iter().enumerate() {
            info!("Executing step {}/{}: {}", idx + 1, total, step.name);

            if !self.emit(Event::step_start(step.name.as_str())).await {
                return;
            }

            if let Err(e) = self.runner.run_step(&self.env, step, &self.events).await {
                error!("Step '{}' failed: {}", step.name, e);
                if self
                    .emit(Event::step_failure(step.name.as_str(), e.to_string()))
                    .await
                {
                    self.emit(Event::pipeline_failure(format!(
                        "step '{}' failed",
                        step.name
                    )))
                    .await;
                }
                return;
            }

            if !self.emit(Event::step_success(step.name.as_str())).await {
                return;
            }
        }

        info!("Build {} completed successfully", self.build_id);
        self.emit(Event::pipeline_success()).await;
    }

    /// Queues an event, waiting while the buffer is full
    ///
    /// Returns false when the consumer has dropped the stream; the run is
    /// abandoned at that point.
    async fn emit(&self, event: Event) -> bool {
        debug!("Build {}: {}", self.build_id, event.type_name());
        if self.events.send(event).await.is_err() {
            warn!(
                "Event consumer for build {} went away, abandoning run",
                self.build_id
            );
            return false;
        }
        true
    }
}

/// The environment of the current process, skipping non UTF-8 entries
fn inherited_environment() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Builds the `KEY=VALUE` list every step of a run receives
///
/// Later entries shadow earlier ones: inherited variables come first, then
/// the definition's global environment, then the variables describing the
/// build itself.
pub fn run_environment(
    inherited: impl IntoIterator<Item = (String, String)>,
    global_env: &HashMap<String, String>,
    metadata: &Metadata,
    build_id: i64,
) -> Vec<String> {
    let mut env: Vec<String> = inherited
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();

    env.extend(
        global_env
            .iter()
            .map(|(key, value)| format!("{}={}", key, value)),
    );

    env.push(format!("COMPONENT={}", metadata.component));
    env.push(format!("GIT_SHA={}", metadata.git_sha));
    env.push(format!("BUILD_ID={}", build_id));
    env
}
