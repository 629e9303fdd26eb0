//! Centralized default constants for the studia pipeline.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates should reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name.
pub const EMBED_MODEL: &str = "mxbai-embed-large";

/// Embedding vector dimension.
///
/// Must match the record store's vector column width exactly; a mismatch is
/// a deployment-time configuration error, not a runtime-recoverable one.
pub const EMBED_DIMENSION: usize = 1024;

// =============================================================================
// MODEL SERVICE
// =============================================================================

/// Default model-serving runtime base URL.
pub const MODEL_SERVICE_URL: &str = "http://127.0.0.1:11434";

/// Per-request timeout for text extraction calls (seconds).
pub const EXTRACT_TIMEOUT_SECS: u64 = 120;

/// Per-request timeout for embedding calls (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// RETRY
// =============================================================================

/// Default maximum attempts for remote operations.
pub const MAX_RETRIES: u32 = 3;

/// Base delay before the first retry (milliseconds).
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Exponential backoff multiplier between attempts.
pub const RETRY_MULTIPLIER: f64 = 2.0;

// =============================================================================
// MATERIAL PROCESSING
// =============================================================================

/// Overall per-step budget for extract/embed during material processing
/// (seconds).
pub const PROCESSING_TIMEOUT_SECS: u64 = 300;

/// Maximum materials processed concurrently by the ingest worker.
pub const INGEST_MAX_CONCURRENT: usize = 4;

/// Capacity of the ingest queue channel.
pub const INGEST_QUEUE_CAPACITY: usize = 256;

/// Broadcast channel capacity for worker events.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// SEARCH
// =============================================================================

/// Minimum trimmed query length; shorter queries short-circuit to empty
/// results without an embedding call.
pub const MIN_QUERY_CHARS: usize = 3;

/// Default result count for semantic search.
pub const SEARCH_LIMIT: i64 = 5;

/// Maximum excerpt length in characters for search results.
pub const EXCERPT_LENGTH: usize = 500;

/// Marker appended to an excerpt when the source text was truncated.
pub const EXCERPT_ELLIPSIS: &str = "...";

// =============================================================================
// CONTEXT AGGREGATION
// =============================================================================

/// Overall budget for the context fan-out (milliseconds). Fetches that have
/// not completed by the deadline are treated as absent.
pub const CONTEXT_TIMEOUT_MS: u64 = 2000;

/// Maximum prior exchanges included in a user context.
pub const HISTORY_LIMIT: i64 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_defaults() {
        assert_eq!(EMBED_DIMENSION, 1024);
        assert_eq!(EMBED_MODEL, "mxbai-embed-large");
    }

    #[test]
    fn test_retry_defaults() {
        assert_eq!(MAX_RETRIES, 3);
        assert_eq!(RETRY_BASE_DELAY_MS, 500);
        assert!((RETRY_MULTIPLIER - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_search_defaults() {
        assert_eq!(MIN_QUERY_CHARS, 3);
        assert_eq!(EXCERPT_LENGTH, 500);
    }

    #[test]
    fn test_context_defaults() {
        assert_eq!(CONTEXT_TIMEOUT_MS, 2000);
        assert_eq!(HISTORY_LIMIT, 10);
    }
}
