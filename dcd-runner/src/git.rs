//! Thin wrapper around the `git` binary

use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("unexpected output from git {command}: {output:?}")]
    UnexpectedOutput { command: String, output: String },
}

/// Runs git with `args` inside `repo` and returns its stdout
pub(crate) async fn run_git(repo: &Path, args: &[&str]) -> Result<String, GitError> {
    let command = args.join(" ");
    debug!("Running git {} in {}", command, repo.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .await
        .map_err(|source| GitError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(GitError::Failed {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
