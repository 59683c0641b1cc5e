//! schemasync - Schema Synchronization Engine
//!
//! Compares the schema of a source and a destination database and
//! generates the DDL that brings the destination in line with the source.
//!
//! Pipeline, once per category (tables, views, functions, procedures,
//! triggers):
//! - List: object names from both sides, through an [`accessor::Accessor`]
//! - Fetch: per-object metadata with bounded concurrency
//! - Diff: pure structural comparison into ordered statements
//! - Emit: banner, delimiter directives and statements into an output sink

pub mod accessor;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod output;
pub mod schema;

pub use error::{AccessError, SyncError, SyncResult};
pub use orchestrator::{DiffOrchestrator, RunSummary};
