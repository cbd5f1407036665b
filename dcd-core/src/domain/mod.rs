//! Core domain types
//!
//! This module contains the domain structures shared between the engine
//! (which executes pipelines), the stores (which persist runs) and the CLI.

pub mod definition;
pub mod event;
pub mod metadata;
pub mod state;
