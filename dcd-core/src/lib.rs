//! dcd Core
//!
//! Core types and abstractions for the dcd pipeline executor.
//!
//! This crate contains:
//! - Domain types: metadata, pipeline definitions, run state and events
//! - Backend contract: build-id allocation and run persistence

pub mod backend;
pub mod domain;

pub use backend::{Backend, BackendError};
pub use domain::definition::{DefinitionError, PipelineDefinition, Step};
pub use domain::event::{Event, EventKind};
pub use domain::metadata::Metadata;
pub use domain::state::{PipelineState, PipelineStatus};
