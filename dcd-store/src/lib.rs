//! SQLite persistence for dcd
//!
//! Provides [`SqliteBackend`], a durable implementation of
//! [`dcd_core::Backend`] built on sqlx.

pub mod backend;
pub mod db;
pub mod repository;

pub use backend::SqliteBackend;
pub use repository::pipeline::PipelineRecord;
