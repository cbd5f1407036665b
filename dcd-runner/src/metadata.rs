//! Build metadata discovery
//!
//! Derives the component name from the `origin` remote and the commit id
//! from `HEAD` of the checkout the pipeline runs in.

use dcd_core::Metadata;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

use crate::git::{GitError, run_git};

static REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[:/]([^/:]+/[^/]+)\.git$").expect("repository URL pattern is valid")
});

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no repository name found in URL: {0}")]
    InvalidRemoteUrl(String),

    #[error("failed to get git remote origin: {0}")]
    Remote(#[source] GitError),

    #[error("failed to get git SHA: {0}")]
    GitSha(#[source] GitError),
}

/// Discovers metadata for the checkout at `repo_path`
pub async fn discover(repo_path: &Path) -> Result<Metadata, MetadataError> {
    let url = run_git(repo_path, &["remote", "get-url", "origin"])
        .await
        .map_err(MetadataError::Remote)?;
    let component = repo_name_from_git_url(url.trim())?;

    let git_sha = run_git(repo_path, &["rev-parse", "HEAD"])
        .await
        .map_err(MetadataError::GitSha)?
        .trim()
        .to_string();

    debug!("Discovered component {} at {}", component, git_sha);
    Ok(Metadata { component, git_sha })
}

/// Extracts the repository name from an SSH or HTTPS clone URL
///
/// `git@github.com:org/name.git` and `https://github.com/org/name.git` both
/// yield `name`.
pub fn repo_name_from_git_url(url: &str) -> Result<String, MetadataError> {
    let captures = REPO_URL
        .captures(url)
        .ok_or_else(|| MetadataError::InvalidRemoteUrl(url.to_string()))?;

    captures[1]
        .rsplit('/')
        .next()
        .map(str::to_string)
        .ok_or_else(|| MetadataError::InvalidRemoteUrl(url.to_string()))
}
