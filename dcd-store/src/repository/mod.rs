//! Repository Module
//!
//! Data access layer for the SQLite store.
//! Each repository handles database operations for one table.

pub mod counter;
pub mod event;
pub mod pipeline;

pub use counter as counter_repository;
pub use event as event_repository;
pub use pipeline as pipeline_repository;
