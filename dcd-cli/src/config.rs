//! Configuration module
//!
//! Handles CLI configuration and opening the state backend it selects.

use anyhow::{Context, Result};
use dcd_core::Backend;
use dcd_runner::MemoryBackend;
use dcd_store::SqliteBackend;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Checkout the pipeline runs for
    pub repo: PathBuf,

    /// URL of the SQLite state database. `None` uses the per-user state
    /// directory.
    pub database_url: Option<String>,

    /// Use a throwaway in-memory backend
    pub memory: bool,
}

impl Config {
    /// Opens the backend this configuration selects
    pub async fn open_backend(&self) -> Result<Arc<dyn Backend>> {
        if self.memory {
            tracing::debug!("Using in-memory backend");
            return Ok(Arc::new(MemoryBackend::new()));
        }

        let database_url = match &self.database_url {
            Some(url) => url.clone(),
            None => default_database_url()?,
        };

        let backend = SqliteBackend::connect(&database_url)
            .await
            .with_context(|| format!("failed to open state database {}", database_url))?;
        Ok(Arc::new(backend))
    }
}

/// State database in the user's state directory
///
/// Kept outside the checkout: anything created inside it would make the
/// working tree dirty before the pre-flight checks run.
pub fn default_database_url() -> Result<String> {
    let state_dir = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .context("could not determine a state directory, pass --database-url")?;

    Ok(database_url_in(&state_dir))
}

/// URL of the state database kept under `state_dir`
pub fn database_url_in(state_dir: &Path) -> String {
    format!(
        "sqlite://{}",
        state_dir.join("dcd").join("state.db").display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_ignores_database_url() {
        let config = Config {
            repo: PathBuf::from("."),
            database_url: Some("sqlite:///nonexistent/dir/state.db?mode=ro".to_string()),
            memory: true,
        };

        let backend = config.open_backend().await.unwrap();
        assert_eq!(backend.allocate_build_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_backend_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            repo: PathBuf::from("."),
            database_url: Some(database_url_in(dir.path())),
            memory: false,
        };

        let backend = config.open_backend().await.unwrap();
        assert_eq!(backend.allocate_build_id().await.unwrap(), 1);
        backend.close().await;

        assert!(dir.path().join("dcd").join("state.db").exists());
    }

    #[test]
    fn test_database_url_in() {
        let url = database_url_in(Path::new("/var/lib/ci"));
        assert_eq!(url, "sqlite:///var/lib/ci/dcd/state.db");
    }

    #[test]
    fn test_default_database_is_not_relative() {
        if let Ok(url) = default_database_url() {
            let path = url.strip_prefix("sqlite://").unwrap();
            assert!(Path::new(path).is_absolute(), "url: {}", url);
            assert!(path.ends_with("dcd/state.db"));
        }
    }
}
