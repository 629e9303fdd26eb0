//! # studia-core
//!
//! Core types, traits, and abstractions for the studia ingestion and
//! retrieval pipeline.
//!
//! This crate provides the foundational data structures, the error taxonomy,
//! the shared retry policy, and the trait seams that the other studia crates
//! implement.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod retry;
pub mod similarity;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use retry::{with_retry, RetryPolicy};
pub use similarity::cosine_similarity;
pub use traits::*;
