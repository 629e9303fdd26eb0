//! # studia-inference
//!
//! Client for the external model-serving runtime: text extraction from
//! uploaded files and embedding generation, with bounded retry, exponential
//! backoff, and transient/permanent failure classification.
//!
//! ## Example
//!
//! ```ignore
//! use studia_inference::HttpModelService;
//! use studia_core::ModelService;
//!
//! let service = HttpModelService::from_env();
//! let text = service.extract_text(&bytes, "lecture-01.pdf").await?;
//! let vector = service.generate_embedding(&text).await?;
//! ```

pub mod client;
pub mod mock;

// Re-export core types
pub use studia_core::{Error, ModelService, Result};

pub use client::HttpModelService;
pub use mock::MockModelService;
