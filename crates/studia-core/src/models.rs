//! Core data models for the studia ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use pgvector::Vector;

/// Processing lifecycle of an uploaded material.
///
/// `Pending` is the only initial state (set at upload time, outside this
/// core). `Completed` and `Failed` are terminal; the material processor is
/// the only component that transitions a material out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Text representation used by the record store's status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(crate::Error::Internal(format!(
                "Unknown processing status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored course document tracked through the ingestion pipeline.
///
/// Invariants maintained by the repository update surface:
/// - `embedding` is non-null only when `processing_status` is `Completed`
///   and `extracted_text` is non-empty;
/// - `error_message` is non-null only when `processing_status` is `Failed`;
/// - `processed_at` is set exactly once, on the transition into `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: Uuid,
    pub course_id: Uuid,
    pub file_name: String,
    /// Blob-store path of the uploaded file.
    pub file_path: String,
    /// Declared media type (e.g. "application/pdf").
    pub file_type: String,
    pub file_size: i64,
    pub processing_status: ProcessingStatus,
    pub extracted_text: Option<String>,
    #[serde(skip)]
    pub embedding: Option<Vector>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// Whether this material can serve semantic search (completed with a
    /// stored embedding).
    pub fn is_searchable(&self) -> bool {
        self.processing_status == ProcessingStatus::Completed && self.embedding.is_some()
    }
}

/// Row shape returned by the database-native ranking function and produced
/// by the in-process fallback ranking.
#[derive(Debug, Clone)]
pub struct RankedMaterial {
    pub id: Uuid,
    pub file_name: String,
    pub extracted_text: Option<String>,
    pub file_type: String,
    pub similarity: f32,
}

/// A single semantic search hit. Request-scoped, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: Uuid,
    pub file_name: String,
    /// Bounded excerpt of the extracted text (≤500 chars, ellipsis-marked
    /// when truncated).
    pub excerpt: String,
    /// Cosine similarity clamped to [0, 1].
    pub similarity: f32,
    pub file_type: String,
}

/// Per-user tutoring preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyPreferences {
    pub learning_style: Option<String>,
    pub explanation_depth: Option<String>,
    pub tone: Option<String>,
    pub language: Option<String>,
}

/// Academic profile supplied by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcademicProfile {
    pub grade_level: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
}

/// One prior exchange message in a tutoring conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Assembled per-request context for prompt construction.
///
/// Assembled fresh per request, never cached. The presence flags are derived
/// strictly from the fetch outcomes — use [`UserContext::from_parts`] so the
/// flags cannot drift from the data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub preferences: Option<StudyPreferences>,
    pub academic: Option<AcademicProfile>,
    /// Prior exchanges, oldest first, capped at the history limit.
    pub history: Vec<HistoryMessage>,
    pub has_preferences: bool,
    pub has_academic: bool,
    pub has_history: bool,
}

impl UserContext {
    /// A fully-empty context (all components absent).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a context from fetch outcomes, deriving the presence flags.
    pub fn from_parts(
        preferences: Option<StudyPreferences>,
        academic: Option<AcademicProfile>,
        history: Vec<HistoryMessage>,
    ) -> Self {
        Self {
            has_preferences: preferences.is_some(),
            has_academic: academic.is_some(),
            has_history: !history.is_empty(),
            preferences,
            academic,
            history,
        }
    }
}
