//! Structured logging schema and field name constants for studia.
//!
//! All crates use these constants for consistent structured logging fields so
//! log aggregation tools can query by standardized names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "ingest", "search", "db", "inference", "context"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "processor", "queue", "model_service", "pool", "aggregator"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "process_material", "search", "extract_text", "embed"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Material UUID being operated on.
pub const MATERIAL_ID: &str = "material_id";

/// Course UUID scoping an operation.
pub const COURSE_ID: &str = "course_id";

/// User UUID scoping a context fetch.
pub const USER_ID: &str = "user_id";

/// Search query text.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Retry attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

/// Byte size of a downloaded blob or model payload.
pub const BYTE_SIZE: &str = "byte_size";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
