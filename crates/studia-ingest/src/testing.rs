//! In-memory trait implementations for tests.
//!
//! Always compiled so integration tests (in `tests/`) and downstream crates'
//! dev builds can share them; production code never constructs these.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use uuid::Uuid;

use studia_core::{
    AcademicProfile, BlobStore, ContextRepository, Error, HistoryMessage, Material,
    MaterialRepository, ProcessingStatus, RankedMaterial, Result, StudyPreferences,
};

/// Material repository backed by a `HashMap`, with scripted failure queues.
#[derive(Default)]
pub struct InMemoryMaterialRepository {
    materials: Mutex<HashMap<Uuid, Material>>,
    rank_results: Mutex<Option<Vec<RankedMaterial>>>,
    rank_failures: Mutex<VecDeque<Error>>,
    list_failures: Mutex<VecDeque<Error>>,
    // Strictly increasing created_at offsets so upload order is unambiguous.
    seed_counter: std::sync::atomic::AtomicI64,
}

impl InMemoryMaterialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a `pending` material and return its id.
    pub fn seed_pending(&self, file_name: &str, file_path: &str) -> Uuid {
        self.seed_pending_for_course(Uuid::new_v4(), file_name, file_path)
    }

    pub fn seed_pending_for_course(
        &self,
        course_id: Uuid,
        file_name: &str,
        file_path: &str,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let seq = self
            .seed_counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let now = Utc::now() + chrono::Duration::microseconds(seq);
        let material = Material {
            id,
            course_id,
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            file_type: file_name.rsplit('.').next().unwrap_or("bin").to_string(),
            file_size: 0,
            processing_status: ProcessingStatus::Pending,
            extracted_text: None,
            embedding: None,
            processed_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.materials.lock().unwrap().insert(id, material);
        id
    }

    /// Insert a `completed` material with text and embedding.
    pub fn seed_completed(&self, course_id: Uuid, file_name: &str, text: &str, embedding: Vec<f32>) -> Uuid {
        let id = self.seed_pending_for_course(course_id, file_name, "seed/path");
        let mut materials = self.materials.lock().unwrap();
        let material = materials.get_mut(&id).unwrap();
        material.processing_status = ProcessingStatus::Completed;
        material.extracted_text = Some(text.to_string());
        material.embedding = Some(Vector::from(embedding));
        material.processed_at = Some(Utc::now());
        id
    }

    pub fn get(&self, id: Uuid) -> Material {
        self.materials.lock().unwrap().get(&id).cloned().unwrap()
    }

    pub fn len(&self) -> usize {
        self.materials.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Script the result of the next `rank_similar` calls.
    pub fn set_rank_results(&self, results: Vec<RankedMaterial>) {
        *self.rank_results.lock().unwrap() = Some(results);
    }

    /// Queue an error for the next `rank_similar` call.
    pub fn push_rank_failure(&self, error: Error) {
        self.rank_failures.lock().unwrap().push_back(error);
    }

    /// Queue an error for the next `list_completed_embedded` call.
    pub fn push_list_failure(&self, error: Error) {
        self.list_failures.lock().unwrap().push_back(error);
    }
}

#[async_trait]
impl MaterialRepository for InMemoryMaterialRepository {
    async fn fetch(&self, id: Uuid) -> Result<Material> {
        self.materials
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::MaterialNotFound(id))
    }

    async fn set_processing(&self, id: Uuid) -> Result<()> {
        let mut materials = self.materials.lock().unwrap();
        let material = materials.get_mut(&id).ok_or(Error::MaterialNotFound(id))?;
        material.processing_status = ProcessingStatus::Processing;
        material.error_message = None;
        material.updated_at = Utc::now();
        Ok(())
    }

    async fn complete(&self, id: Uuid, extracted_text: &str, embedding: Option<Vector>) -> Result<()> {
        let mut materials = self.materials.lock().unwrap();
        let material = materials.get_mut(&id).ok_or(Error::MaterialNotFound(id))?;
        material.processing_status = ProcessingStatus::Completed;
        material.extracted_text = Some(extracted_text.to_string());
        material.embedding = embedding;
        material.error_message = None;
        material.processed_at.get_or_insert_with(Utc::now);
        material.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, id: Uuid, error_message: &str) -> Result<()> {
        let mut materials = self.materials.lock().unwrap();
        let material = materials.get_mut(&id).ok_or(Error::MaterialNotFound(id))?;
        material.processing_status = ProcessingStatus::Failed;
        material.error_message = Some(error_message.to_string());
        material.updated_at = Utc::now();
        Ok(())
    }

    async fn rank_similar(
        &self,
        _course_id: Uuid,
        _query: &Vector,
        limit: i64,
    ) -> Result<Vec<RankedMaterial>> {
        if let Some(err) = self.rank_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut results = self
            .rank_results
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_default();
        results.truncate(limit as usize);
        Ok(results)
    }

    async fn list_completed_embedded(&self, course_id: Uuid) -> Result<Vec<Material>> {
        if let Some(err) = self.list_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let materials = self.materials.lock().unwrap();
        let mut completed: Vec<Material> = materials
            .values()
            .filter(|m| m.course_id == course_id && m.is_searchable())
            .cloned()
            .collect();
        completed.sort_by_key(|m| m.created_at);
        Ok(completed)
    }
}

/// Blob store backed by a `HashMap`, with a scripted failure queue.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<VecDeque<Error>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, path: &str, data: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
    }

    /// Queue an error for the next `download` call.
    pub fn push_failure(&self, error: Error) {
        self.failures.lock().unwrap().push_back(error);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob not found: {}", path)))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(path))
    }
}

/// Context repository with fixed responses and scripted failures, plus an
/// optional per-call delay for budget tests.
#[derive(Default)]
pub struct InMemoryContextRepository {
    preferences: Mutex<Option<StudyPreferences>>,
    profile: Mutex<Option<AcademicProfile>>,
    history: Mutex<Vec<HistoryMessage>>,
    preference_failures: Mutex<VecDeque<Error>>,
    profile_failures: Mutex<VecDeque<Error>>,
    history_failures: Mutex<VecDeque<Error>>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl InMemoryContextRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_preferences(&self, preferences: StudyPreferences) {
        *self.preferences.lock().unwrap() = Some(preferences);
    }

    pub fn set_profile(&self, profile: AcademicProfile) {
        *self.profile.lock().unwrap() = Some(profile);
    }

    pub fn set_history(&self, history: Vec<HistoryMessage>) {
        *self.history.lock().unwrap() = history;
    }

    pub fn push_preference_failure(&self, error: Error) {
        self.preference_failures.lock().unwrap().push_back(error);
    }

    pub fn push_profile_failure(&self, error: Error) {
        self.profile_failures.lock().unwrap().push_back(error);
    }

    pub fn push_history_failure(&self, error: Error) {
        self.history_failures.lock().unwrap().push_back(error);
    }

    /// Delay every fetch; used to exercise the aggregation budget.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn simulate_delay(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl ContextRepository for InMemoryContextRepository {
    async fn preferences(&self, _user_id: Uuid) -> Result<Option<StudyPreferences>> {
        self.simulate_delay().await;
        if let Some(err) = self.preference_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.preferences.lock().unwrap().clone())
    }

    async fn academic_profile(&self, _user_id: Uuid) -> Result<Option<AcademicProfile>> {
        self.simulate_delay().await;
        if let Some(err) = self.profile_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn recent_history(
        &self,
        _user_id: Uuid,
        _course_id: Uuid,
        limit: i64,
    ) -> Result<Vec<HistoryMessage>> {
        self.simulate_delay().await;
        if let Some(err) = self.history_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let history = self.history.lock().unwrap();
        let skip = history.len().saturating_sub(limit as usize);
        Ok(history.iter().skip(skip).cloned().collect())
    }
}
