//! Pipeline run state domain types

use serde::{Deserialize, Serialize};

/// Persisted record of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub build_id: i64,
    pub status: PipelineStatus,
}

impl PipelineState {
    /// State submitted when a run has been allocated but not started
    pub fn pending(build_id: i64) -> Self {
        Self {
            build_id,
            status: PipelineStatus::Pending,
        }
    }
}

/// Status of a pipeline run
///
/// An open set: backends may store statuses this crate does not know about,
/// which round-trip through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PipelineStatus {
    Pending,
    Succeeded,
    Failed,
    Other(String),
}

impl PipelineStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Succeeded => "succeeded",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineStatus::Pending)
    }
}

impl From<&str> for PipelineStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => PipelineStatus::Pending,
            "succeeded" => PipelineStatus::Succeeded,
            "failed" => PipelineStatus::Failed,
            other => PipelineStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for PipelineStatus {
    fn from(s: String) -> Self {
        PipelineStatus::from(s.as_str())
    }
}

impl From<PipelineStatus> for String {
    fn from(status: PipelineStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_state() {
        let state = PipelineState::pending(7);
        assert_eq!(state.build_id, 7);
        assert_eq!(state.status, PipelineStatus::Pending);
        assert!(!state.status.is_terminal());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(PipelineStatus::from("succeeded"), PipelineStatus::Succeeded);
        assert_eq!(PipelineStatus::Failed.to_string(), "failed");

        let custom = PipelineStatus::from("cancelled");
        assert_eq!(custom, PipelineStatus::Other("cancelled".to_string()));
        assert_eq!(custom.as_str(), "cancelled");
        assert!(custom.is_terminal());
    }

    #[test]
    fn test_status_serializes_as_string() {
        let state = PipelineState::pending(1);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({"build_id": 1, "status": "pending"}));
    }
}
