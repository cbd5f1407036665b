//! Pipeline definition domain types
//!
//! A definition is the parsed form of a pipeline file:
//!
//! ```yaml
//! global-env:
//!   DEPLOY_REGION: eu-west-1
//! steps:
//!   - name: build
//!     script: ./ci/build.sh
//!   - name: deploy
//!     script: ./ci/deploy.sh
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single named step of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Label used in events. Not required to be unique.
    pub name: String,
    /// Executable run with no arguments
    pub script: String,
}

impl Step {
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
        }
    }
}

/// Ordered steps plus the environment shared by all of them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    #[serde(
        rename = "global-env",
        default,
        deserialize_with = "deserialize_env",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub global_env: HashMap<String, String>,
    pub steps: Vec<Step>,
}

/// Errors raised while loading a pipeline definition
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read pipeline definition {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed pipeline definition: {0}")]
    Parse(#[from] serde_yml::Error),
}

pub type Result<T> = std::result::Result<T, DefinitionError>;

impl PipelineDefinition {
    /// Reads and parses a definition file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&contents)
    }

    /// Parses a definition from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yml::from_str(contents)?)
    }

    /// Serializes the definition back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yml::to_string(self)?)
    }
}

/// Accepts any YAML scalar as an environment value (`RETRIES: 3` is "3")
fn deserialize_env<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yml::Value;

    let raw = Option::<HashMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();

    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                _ => {
                    return Err(D::Error::custom(format!(
                        "global-env value for '{}' must be a scalar",
                        key
                    )));
                }
            };
            Ok((key, value))
        })
        .collect()
}
