//! Pre-flight repository checks
//!
//! A run may only start from a checkout that is clean and exactly in sync
//! with its upstream branch. The checks are a trait so the orchestrator can
//! be exercised without a repository.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::git::{GitError, run_git};

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("the working directory contains uncommitted changes")]
    UncommittedChanges,

    #[error(
        "the local repository is out of sync with the upstream repository: {}",
        describe_unsynced(.remote_ahead, .local_ahead)
    )]
    UnsyncedChanges { remote_ahead: u32, local_ahead: u32 },

    #[error("the current branch is {branch:?}, not {expected}")]
    NotOnBranch { branch: String, expected: String },

    #[error(transparent)]
    Git(#[from] GitError),
}

pub type Result<T> = std::result::Result<T, PreflightError>;

fn describe_unsynced(remote_ahead: &u32, local_ahead: &u32) -> String {
    fn commits(count: u32, side: &str) -> Option<String> {
        match count {
            0 => None,
            1 => Some(format!("1 {} commit", side)),
            n => Some(format!("{} {} commits", n, side)),
        }
    }

    [commits(*local_ahead, "local"), commits(*remote_ahead, "remote")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Repository state checks run before a pipeline starts
#[async_trait]
pub trait Preflight: Send + Sync {
    /// Fails if anything is modified, staged or untracked
    async fn check_clean_working_tree(&self) -> Result<()>;

    /// Fails unless `HEAD` and `<remote>/<branch>` point at the same history
    ///
    /// Being ahead is rejected just like being behind.
    async fn check_synchronized_with_upstream(&self, remote: &str, branch: &str) -> Result<()>;

    /// Fails unless `expected` is the checked-out branch
    async fn check_on_branch(&self, expected: &str) -> Result<()>;
}

/// Runs every check the configuration asks for, in order
pub async fn run_checks(preflight: &dyn Preflight, config: &Config) -> Result<()> {
    preflight.check_clean_working_tree().await?;
    preflight
        .check_synchronized_with_upstream(&config.upstream_remote, &config.upstream_branch)
        .await?;
    if let Some(expected) = &config.require_branch {
        preflight.check_on_branch(expected).await?;
    }

    info!(
        "Pre-flight checks passed ({}/{})",
        config.upstream_remote, config.upstream_branch
    );
    Ok(())
}

/// Git-backed pre-flight checks for the checkout at `repo_path`
#[derive(Debug, Clone)]
pub struct GitPreflight {
    repo_path: PathBuf,
}

impl GitPreflight {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }
}

#[async_trait]
impl Preflight for GitPreflight {
    async fn check_clean_working_tree(&self) -> Result<()> {
        let status = run_git(&self.repo_path, &["status", "--porcelain"]).await?;

        if !status.is_empty() {
            debug!("Working tree is dirty:\n{}", status);
            return Err(PreflightError::UncommittedChanges);
        }

        Ok(())
    }

    async fn check_synchronized_with_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        let range = format!("{}/{}...HEAD", remote, branch);
        let args = ["rev-list", "--left-right", "--count", range.as_str()];
        let output = run_git(&self.repo_path, &args).await?;

        let unexpected = || GitError::UnexpectedOutput {
            command: args.join(" "),
            output: output.clone(),
        };

        let counts: Vec<&str> = output.split_whitespace().collect();
        let [remote_ahead, local_ahead] = counts.as_slice() else {
            return Err(unexpected().into());
        };
        let remote_ahead: u32 = remote_ahead.parse().map_err(|_| unexpected())?;
        let local_ahead: u32 = local_ahead.parse().map_err(|_| unexpected())?;

        if remote_ahead > 0 || local_ahead > 0 {
            return Err(PreflightError::UnsyncedChanges {
                remote_ahead,
                local_ahead,
            });
        }

        Ok(())
    }

    async fn check_on_branch(&self, expected: &str) -> Result<()> {
        let output = run_git(&self.repo_path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let branch = output.trim();

        if branch != expected {
            return Err(PreflightError::NotOnBranch {
                branch: branch.to_string(),
                expected: expected.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{clone_repo, commit_file, git, git_available, init_repo};

    #[test]
    fn test_unsynced_message() {
        let err = PreflightError::UnsyncedChanges {
            remote_ahead: 1,
            local_ahead: 2,
        };
        assert_eq!(
            err.to_string(),
            "the local repository is out of sync with the upstream repository: 2 local commits and 1 remote commit"
        );

        let err = PreflightError::UnsyncedChanges {
            remote_ahead: 3,
            local_ahead: 0,
        };
        assert!(err.to_string().ends_with(": 3 remote commits"));

        let err = PreflightError::UnsyncedChanges {
            remote_ahead: 0,
            local_ahead: 1,
        };
        assert!(err.to_string().ends_with(": 1 local commit"));
    }

    #[tokio::test]
    async fn test_clean_working_tree() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        let preflight = GitPreflight::new(dir.path());
        assert!(preflight.check_clean_working_tree().await.is_ok());
    }

    #[tokio::test]
    async fn test_untracked_file_is_uncommitted_change() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("scratch.txt"), "wip").unwrap();

        let result = GitPreflight::new(dir.path()).check_clean_working_tree().await;
        assert!(matches!(result, Err(PreflightError::UncommittedChanges)));
    }

    #[tokio::test]
    async fn test_modified_file_is_uncommitted_change() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("README.md"), "changed\n").unwrap();

        let result = GitPreflight::new(dir.path()).check_clean_working_tree().await;
        assert!(matches!(result, Err(PreflightError::UncommittedChanges)));
    }

    #[tokio::test]
    async fn test_synchronized_clone() {
        if !git_available() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let upstream = root.path().join("upstream");
        let local = root.path().join("local");
        std::fs::create_dir(&upstream).unwrap();
        init_repo(&upstream);
        clone_repo(&upstream, &local);

        let preflight = GitPreflight::new(&local);
        assert!(
            preflight
                .check_synchronized_with_upstream("origin", "main")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_local_ahead_is_rejected() {
        if !git_available() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let upstream = root.path().join("upstream");
        let local = root.path().join("local");
        std::fs::create_dir(&upstream).unwrap();
        init_repo(&upstream);
        clone_repo(&upstream, &local);
        commit_file(&local, "feature.txt", "new\n");

        let result = GitPreflight::new(&local)
            .check_synchronized_with_upstream("origin", "main")
            .await;
        assert!(matches!(
            result,
            Err(PreflightError::UnsyncedChanges {
                remote_ahead: 0,
                local_ahead: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_remote_ahead_is_rejected() {
        if !git_available() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let upstream = root.path().join("upstream");
        let local = root.path().join("local");
        std::fs::create_dir(&upstream).unwrap();
        init_repo(&upstream);
        clone_repo(&upstream, &local);
        commit_file(&upstream, "other.txt", "one\n");
        commit_file(&upstream, "other.txt", "two\n");
        git(&local, &["fetch", "-q", "origin"]);

        let result = GitPreflight::new(&local)
            .check_synchronized_with_upstream("origin", "main")
            .await;
        assert!(matches!(
            result,
            Err(PreflightError::UnsyncedChanges {
                remote_ahead: 2,
                local_ahead: 0
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_upstream_is_git_error() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        let result = GitPreflight::new(dir.path())
            .check_synchronized_with_upstream("origin", "main")
            .await;
        assert!(matches!(result, Err(PreflightError::Git(GitError::Failed { .. }))));
    }

    #[tokio::test]
    async fn test_check_on_branch() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let preflight = GitPreflight::new(dir.path());

        assert!(preflight.check_on_branch("main").await.is_ok());

        let result = preflight.check_on_branch("release").await;
        assert!(matches!(
            result,
            Err(PreflightError::NotOnBranch { ref branch, ref expected })
                if branch == "main" && expected == "release"
        ));
    }
}
