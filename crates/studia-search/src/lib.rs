//! # studia-search
//!
//! Retrieval layer for the tutoring chat: semantic search over processed
//! course materials and concurrent aggregation of user context for prompt
//! assembly.

pub mod context;
pub mod semantic;

// Re-export core types
pub use studia_core::{Error, Result};

pub use context::{ContextAggregator, ContextConfig};
pub use semantic::{SearchConfig, SemanticSearchService};
