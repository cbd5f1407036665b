//! Pipeline execution for dcd
//!
//! Turns a loaded [`dcd_core::PipelineDefinition`] into a running build:
//! pre-flight checks against the checkout, build id allocation through a
//! [`dcd_core::Backend`], and step execution with output streamed as
//! [`dcd_core::Event`]s.

pub mod backend;
pub mod config;
pub mod metadata;
pub mod pipeline;
pub mod preflight;
pub mod step;

mod git;

pub use backend::MemoryBackend;
pub use config::{Config, ConfigError};
pub use git::GitError;
pub use metadata::MetadataError;
pub use pipeline::{Pipeline, PipelineRun, RunError};
pub use preflight::{GitPreflight, Preflight, PreflightError};
pub use step::{StepError, StepRunner};
