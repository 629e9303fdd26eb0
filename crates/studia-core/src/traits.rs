//! Core traits for studia abstractions.
//!
//! These traits define the seams between the pipeline and its collaborators
//! (model-serving runtime, blob store, record store), enabling pluggable
//! backends and testability. Components receive trait objects through their
//! constructors; there is no ambient global state.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// MODEL SERVICE
// =============================================================================

/// Client for the external model-serving runtime.
///
/// One configured instance is shared across the pipeline via `Arc`.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Extract text from a binary file.
    async fn extract_text(&self, data: &[u8], file_name: &str) -> Result<String>;

    /// Generate a fixed-length embedding vector from text.
    ///
    /// Fails with [`crate::Error::EmptyInput`] before any network call when
    /// the input trims to empty.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimension this service produces.
    fn dimension(&self) -> usize;
}

// =============================================================================
// BLOB STORE
// =============================================================================

/// Read access to the object store holding uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download the blob at the given path.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Check whether a blob exists at the given path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

// =============================================================================
// MATERIAL REPOSITORY
// =============================================================================

/// Record-store access for materials and their status state machine.
///
/// The update surface enforces the material invariants: `complete` is the
/// only path that sets `embedding`/`processed_at`, `fail` is the only path
/// that sets `error_message`, and each transition clears the fields the new
/// status forbids.
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    /// Fetch a material by id; [`crate::Error::MaterialNotFound`] if absent.
    async fn fetch(&self, id: Uuid) -> Result<Material>;

    /// Transition a material into `processing`.
    async fn set_processing(&self, id: Uuid) -> Result<()>;

    /// Transition a material into `completed`, persisting the extracted text
    /// and (when the text was non-empty) its embedding. Sets `processed_at`
    /// on the first completion only.
    async fn complete(
        &self,
        id: Uuid,
        extracted_text: &str,
        embedding: Option<Vector>,
    ) -> Result<()>;

    /// Transition a material into `failed` with a human-readable message.
    async fn fail(&self, id: Uuid, error_message: &str) -> Result<()>;

    /// Database-native ranked similarity over completed materials of a
    /// course, descending, up to `limit` rows. May be unavailable in a given
    /// deployment; callers detect that by catching the error.
    async fn rank_similar(
        &self,
        course_id: Uuid,
        query: &Vector,
        limit: i64,
    ) -> Result<Vec<RankedMaterial>>;

    /// All completed materials of a course with non-null embeddings, in
    /// stable fetch order. Source data for the in-process fallback ranking.
    async fn list_completed_embedded(&self, course_id: Uuid) -> Result<Vec<Material>>;
}

// =============================================================================
// CONTEXT REPOSITORY
// =============================================================================

/// Record-store access for the per-user context components.
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Tutoring preferences for a user, if any.
    async fn preferences(&self, user_id: Uuid) -> Result<Option<StudyPreferences>>;

    /// Academic profile for a user, if any.
    async fn academic_profile(&self, user_id: Uuid) -> Result<Option<AcademicProfile>>;

    /// The most recent `limit` exchange messages for a user within a course,
    /// returned oldest-first so they read in conversation order.
    async fn recent_history(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        limit: i64,
    ) -> Result<Vec<HistoryMessage>>;
}
