//! Run command handler
//!
//! Runs a pipeline definition to completion, printing each event and
//! keeping the backend's record of the run up to date.

use anyhow::{Context, Result};
use colored::*;
use dcd_core::{Backend, Event, EventKind, PipelineDefinition, PipelineState, PipelineStatus};
use dcd_runner::{GitPreflight, Pipeline, metadata};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;

/// Handle `dcd run`
///
/// # Arguments
/// * `pipeline_file` - Path to the pipeline definition
/// * `config` - The CLI configuration
pub async fn handle_run(pipeline_file: &Path, config: &Config) -> Result<ExitCode> {
    let metadata = metadata::discover(&config.repo)
        .await
        .context("failed to discover build metadata")?;
    let definition = PipelineDefinition::load(pipeline_file)?;
    let engine_config =
        dcd_runner::Config::from_env().context("failed to load engine configuration")?;
    let backend = config.open_backend().await?;

    info!(
        "Running {} ({} step(s)) for {} at {}",
        pipeline_file.display(),
        definition.steps.len(),
        metadata.component,
        metadata.git_sha
    );

    let pipeline = Pipeline::new(
        definition,
        metadata,
        Arc::clone(&backend),
        Arc::new(GitPreflight::new(&config.repo)),
    )
    .with_config(engine_config);

    let result = run_pipeline(&pipeline, backend.as_ref()).await;
    backend.close().await;

    Ok(match result? {
        PipelineStatus::Succeeded => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Runs `pipeline` to completion and stores its final state
async fn run_pipeline(pipeline: &Pipeline, backend: &dyn Backend) -> Result<PipelineStatus> {
    let run = pipeline.run().await?;
    let build_id = run.build_id();
    let mut events = run.into_receiver();

    let status = follow_run(build_id, &mut events, backend, &mut std::io::stdout()).await?;

    backend
        .submit_pipeline_state(&PipelineState {
            build_id,
            status: status.clone(),
        })
        .await
        .context("failed to store final pipeline state")?;

    info!("Build {} finished: {}", build_id, status);
    Ok(status)
}

/// Drains the events of a run, printing and recording each one
///
/// Returns the final status of the run. A stream that closes without a
/// terminal event counts as a failure.
async fn follow_run<W: Write>(
    build_id: i64,
    events: &mut mpsc::Receiver<Event>,
    backend: &dyn Backend,
    out: &mut W,
) -> Result<PipelineStatus> {
    let mut status = PipelineStatus::Pending;

    while let Some(event) = events.recv().await {
        writeln!(out, "{}", format_event(&event)).context("failed to write event")?;

        if let Err(e) = backend.record_pipeline_event(build_id, &event).await {
            warn!("Failed to record event for build {}: {:#}", build_id, e);
        }

        match event.kind {
            EventKind::PipelineSuccess => status = PipelineStatus::Succeeded,
            EventKind::PipelineFailure { .. } => status = PipelineStatus::Failed,
            _ => {}
        }
    }

    out.flush().context("failed to write event")?;

    if !status.is_terminal() {
        warn!("Event stream of build {} ended without a result", build_id);
        status = PipelineStatus::Failed;
    }
    Ok(status)
}

/// Formats an event as one display line
fn format_event(event: &Event) -> String {
    let message = event.log_message();
    let message = message.trim_end_matches('\n');

    let message = match &event.kind {
        EventKind::PipelineStart { .. } => message.bold(),
        EventKind::StepStart { .. } => message.cyan(),
        EventKind::StepOutput { .. } => message.normal(),
        EventKind::StepSuccess { .. } => message.green(),
        EventKind::StepFailure { .. } => message.red(),
        EventKind::PipelineFailure { .. } => message.red().bold(),
        EventKind::PipelineSuccess => message.green().bold(),
    };

    format!(
        "{} {}",
        event.timestamp.format("%H:%M:%S").to_string().dimmed(),
        message
    )
}
