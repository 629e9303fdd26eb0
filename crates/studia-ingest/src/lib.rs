//! # studia-ingest
//!
//! Asynchronous ingestion pipeline for uploaded course materials.
//!
//! Uploads land in the database as `pending` rows plus a blob on disk; this
//! crate drives each one through extraction and embedding to a terminal
//! `completed` or `failed` status. Processing never bubbles an error to the
//! caller: every failure is recorded on the material row itself.

pub mod processor;
pub mod queue;

// In-memory fixtures for integration tests
// Note: always compiled so tests/ and downstream dev builds can use them
pub mod testing;

// Re-export core types
pub use studia_core::{Error, Result};

pub use processor::{MaterialProcessor, ProcessorConfig};
pub use queue::{IngestEvent, IngestQueue, IngestWorker, WorkerConfig, WorkerHandle};
