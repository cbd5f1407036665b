//! Pipeline event domain types
//!
//! A run produces a totally ordered stream of events. Every event carries the
//! time it was produced; what happened is described by [`EventKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamped pipeline or step lifecycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// What an event reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    PipelineStart { build_id: i64 },
    StepStart { step_name: String },
    StepOutput { step_name: String, text: String },
    StepSuccess { step_name: String },
    StepFailure { step_name: String, reason: String },
    PipelineFailure { reason: String },
    PipelineSuccess,
}

impl Event {
    /// Stamps `kind` with the current time
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn pipeline_start(build_id: i64) -> Self {
        Self::now(EventKind::PipelineStart { build_id })
    }

    pub fn step_start(step_name: impl Into<String>) -> Self {
        Self::now(EventKind::StepStart {
            step_name: step_name.into(),
        })
    }

    pub fn step_output(step_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::now(EventKind::StepOutput {
            step_name: step_name.into(),
            text: text.into(),
        })
    }

    pub fn step_success(step_name: impl Into<String>) -> Self {
        Self::now(EventKind::StepSuccess {
            step_name: step_name.into(),
        })
    }

    pub fn step_failure(step_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::now(EventKind::StepFailure {
            step_name: step_name.into(),
            reason: reason.into(),
        })
    }

    pub fn pipeline_failure(reason: impl Into<String>) -> Self {
        Self::now(EventKind::PipelineFailure {
            reason: reason.into(),
        })
    }

    pub fn pipeline_success() -> Self {
        Self::now(EventKind::PipelineSuccess)
    }

    /// True for the events that close a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::PipelineSuccess | EventKind::PipelineFailure { .. }
        )
    }

    /// Name of the step the event belongs to, if any
    pub fn step_name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::StepStart { step_name }
            | EventKind::StepOutput { step_name, .. }
            | EventKind::StepSuccess { step_name }
            | EventKind::StepFailure { step_name, .. } => Some(step_name),
            EventKind::PipelineStart { .. }
            | EventKind::PipelineFailure { .. }
            | EventKind::PipelineSuccess => None,
        }
    }

    /// Short type tag, matching the serialized `type` field
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::PipelineStart { .. } => "pipeline_start",
            EventKind::StepStart { .. } => "step_start",
            EventKind::StepOutput { .. } => "step_output",
            EventKind::StepSuccess { .. } => "step_success",
            EventKind::StepFailure { .. } => "step_failure",
            EventKind::PipelineFailure { .. } => "pipeline_failure",
            EventKind::PipelineSuccess => "pipeline_success",
        }
    }

    /// Human readable one-liner for logs and the CLI
    pub fn log_message(&self) -> String {
        match &self.kind {
            EventKind::PipelineStart { build_id } => format!("Pipeline start (build {})", build_id),
            EventKind::StepStart { step_name } => format!("Step started: {}", step_name),
            EventKind::StepOutput { step_name, text } => {
                format!("Output from {}: {}", step_name, text)
            }
            EventKind::StepSuccess { step_name } => format!("Step succeeded: {}", step_name),
            EventKind::StepFailure { step_name, reason } => {
                format!("Step failed: {}, Reason: {}", step_name, reason)
            }
            EventKind::PipelineFailure { reason } => format!("Pipeline failed: {}", reason),
            EventKind::PipelineSuccess => "Pipeline succeeded".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(Event::pipeline_success().is_terminal());
        assert!(Event::pipeline_failure("boom").is_terminal());
        assert!(!Event::step_failure("build", "boom").is_terminal());
        assert!(!Event::pipeline_start(1).is_terminal());
    }

    #[test]
    fn test_step_name() {
        assert_eq!(Event::step_output("build", "hi\n").step_name(), Some("build"));
        assert_eq!(Event::pipeline_start(3).step_name(), None);
    }

    #[test]
    fn test_log_messages() {
        assert_eq!(Event::pipeline_start(12).log_message(), "Pipeline start (build 12)");
        assert_eq!(Event::step_start("build").log_message(), "Step started: build");
        assert_eq!(
            Event::step_failure("build", "command failed: exit status: 2").log_message(),
            "Step failed: build, Reason: command failed: exit status: 2"
        );
        assert_eq!(Event::pipeline_success().log_message(), "Pipeline succeeded");
    }

    #[test]
    fn test_serialized_shape() {
        let event = Event::step_output("build", "line\n");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "step_output");
        assert_eq!(json["step_name"], "build");
        assert_eq!(json["text"], "line\n");
        assert!(json["timestamp"].is_string());
        assert_eq!(event.type_name(), "step_output");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_unit_variant_serializes_with_tag() {
        let json = serde_json::to_value(Event::pipeline_success()).unwrap();
        assert_eq!(json["type"], "pipeline_success");
    }
}
