//! Build metadata domain type

use serde::{Deserialize, Serialize};

/// Ambient metadata for a build
///
/// Either discovered from the checkout the pipeline runs in or injected
/// directly (tests). Values are passed through to steps unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Component name, usually the repository name
    pub component: String,
    /// Commit the build runs against
    pub git_sha: String,
}

impl Metadata {
    pub fn new(component: impl Into<String>, git_sha: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            git_sha: git_sha.into(),
        }
    }
}
