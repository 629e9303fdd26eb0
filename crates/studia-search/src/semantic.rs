//! Semantic search over a course's processed materials.
//!
//! Primary ranking happens inside the database via pgvector; when that path
//! fails (missing SQL function, connection hiccup) the service degrades to an
//! in-process cosine pass over the course's embedded materials so search
//! keeps working, just slower.

use std::sync::Arc;
use std::time::Instant;

use pgvector::Vector;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use studia_core::{
    cosine_similarity, defaults, Error, Material, MaterialRepository, ModelService, RankedMaterial,
    Result, SearchResult,
};

/// Search tuning knobs.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Queries shorter than this (in characters, after trimming) return no
    /// results without touching the model service.
    pub min_query_chars: usize,
    /// Excerpt length in characters.
    pub excerpt_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_chars: defaults::MIN_QUERY_CHARS,
            excerpt_length: defaults::EXCERPT_LENGTH,
        }
    }
}

/// Embedding-based search over completed course materials.
pub struct SemanticSearchService {
    materials: Arc<dyn MaterialRepository>,
    model: Arc<dyn ModelService>,
    config: SearchConfig,
}

impl SemanticSearchService {
    pub fn new(materials: Arc<dyn MaterialRepository>, model: Arc<dyn ModelService>) -> Self {
        Self::with_config(materials, model, SearchConfig::default())
    }

    pub fn with_config(
        materials: Arc<dyn MaterialRepository>,
        model: Arc<dyn ModelService>,
        config: SearchConfig,
    ) -> Self {
        Self {
            materials,
            model,
            config,
        }
    }

    /// Rank a course's materials against a free-text query, returning up to
    /// `limit` results.
    ///
    /// Short queries short-circuit to an empty result; any other failure
    /// surfaces as [`Error::Search`].
    #[instrument(skip(self, query), fields(subsystem = "search", component = "semantic", course_id = %course_id, query_len = query.len(), limit))]
    pub async fn search(
        &self,
        course_id: Uuid,
        query: &str,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        let trimmed = query.trim();
        if trimmed.chars().count() < self.config.min_query_chars {
            debug!("Query below minimum length, returning empty result");
            return Ok(Vec::new());
        }

        let start = Instant::now();

        let embedding = self
            .model
            .generate_embedding(trimmed)
            .await
            .map_err(|e| Error::Search(format!("query embedding failed: {}", e)))?;
        let query_vec = Vector::from(embedding);

        let results = match self
            .materials
            .rank_similar(course_id, &query_vec, limit)
            .await
        {
            Ok(ranked) => ranked
                .into_iter()
                .map(|m| self.ranked_to_result(m))
                .collect(),
            Err(e) => {
                warn!(
                    course_id = %course_id,
                    error = %e,
                    "Database ranking unavailable, falling back to in-process scoring"
                );
                self.fallback_search(course_id, &query_vec, limit).await?
            }
        };

        debug!(
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(results)
    }

    /// Load the course's embedded materials and score them locally.
    ///
    /// Input order from the repository is by upload time, and the sort is
    /// stable, so equal scores keep a deterministic order.
    async fn fallback_search(
        &self,
        course_id: Uuid,
        query_vec: &Vector,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        let materials = self
            .materials
            .list_completed_embedded(course_id)
            .await
            .map_err(|e| Error::Search(format!("fallback listing failed: {}", e)))?;

        let query_slice = query_vec.as_slice();
        let mut scored: Vec<(f32, &Material)> = materials
            .iter()
            .filter_map(|m| {
                let embedding = m.embedding.as_ref()?;
                Some((cosine_similarity(query_slice, embedding.as_slice()), m))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(0) as usize);

        Ok(scored
            .into_iter()
            .map(|(similarity, m)| SearchResult {
                id: m.id,
                file_name: m.file_name.clone(),
                excerpt: self.make_excerpt(m.extracted_text.as_deref().unwrap_or_default()),
                similarity,
                file_type: m.file_type.clone(),
            })
            .collect())
    }

    fn ranked_to_result(&self, ranked: RankedMaterial) -> SearchResult {
        SearchResult {
            id: ranked.id,
            file_name: ranked.file_name,
            excerpt: self.make_excerpt(ranked.extracted_text.as_deref().unwrap_or_default()),
            similarity: ranked.similarity.clamp(0.0, 1.0),
            file_type: ranked.file_type,
        }
    }

    /// First `excerpt_length` characters, ellipsis-marked only when the text
    /// was actually cut.
    fn make_excerpt(&self, text: &str) -> String {
        let mut chars = text.char_indices();
        match chars.nth(self.config.excerpt_length) {
            Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], defaults::EXCERPT_ELLIPSIS),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studia_core::RankedMaterial;
    use studia_ingest::testing::InMemoryMaterialRepository;
    use studia_inference::MockModelService;

    fn service(
        repo: Arc<InMemoryMaterialRepository>,
        model: Arc<MockModelService>,
    ) -> SemanticSearchService {
        SemanticSearchService::new(repo, model)
    }

    fn ranked(id: Uuid, name: &str, text: &str, similarity: f32) -> RankedMaterial {
        RankedMaterial {
            id,
            file_name: name.to_string(),
            extracted_text: Some(text.to_string()),
            file_type: "pdf".to_string(),
            similarity,
        }
    }

    #[tokio::test]
    async fn test_short_query_returns_empty_without_embedding() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));
        let service = service(repo, model.clone());

        assert!(service.search(Uuid::new_v4(), "ab", 5).await.unwrap().is_empty());
        assert!(service.search(Uuid::new_v4(), "  a  ", 5).await.unwrap().is_empty());
        assert!(service.search(Uuid::new_v4(), "", 5).await.unwrap().is_empty());
        assert_eq!(model.embed_call_count(), 0);
    }

    #[tokio::test]
    async fn test_three_char_query_is_searched() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));
        repo.set_rank_results(vec![]);

        let service = service(repo, model.clone());
        service.search(Uuid::new_v4(), "dna", 5).await.unwrap();
        assert_eq!(model.embed_call_count(), 1);
    }

    #[tokio::test]
    async fn test_primary_path_maps_ranked_rows() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));

        let id = Uuid::new_v4();
        repo.set_rank_results(vec![ranked(id, "bio.pdf", "cells divide", 0.87)]);

        let service = service(repo, model);
        let results = service.search(Uuid::new_v4(), "mitosis", 5).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].excerpt, "cells divide");
        assert!((results[0].similarity - 0.87).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_primary_scores_are_clamped() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));

        repo.set_rank_results(vec![
            ranked(Uuid::new_v4(), "a.pdf", "x", 1.3),
            ranked(Uuid::new_v4(), "b.pdf", "y", -0.2),
        ]);

        let service = service(repo, model);
        let results = service.search(Uuid::new_v4(), "query", 5).await.unwrap();
        assert_eq!(results[0].similarity, 1.0);
        assert_eq!(results[1].similarity, 0.0);
    }

    #[tokio::test]
    async fn test_embed_failure_is_search_error() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));
        model.push_embed_failure(Error::Transient("model down".into()));

        let service = service(repo, model);
        let result = service.search(Uuid::new_v4(), "photosynthesis", 5).await;
        assert!(matches!(result, Err(Error::Search(_))));
    }

    #[tokio::test]
    async fn test_db_rank_failure_falls_back_to_local_scoring() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));
        let course_id = Uuid::new_v4();

        // Materials whose embeddings are the mock's deterministic vectors,
        // so the query "close match" scores its own text highest.
        let near = MockModelService::embedding_for("close match", 8);
        let far = MockModelService::embedding_for("zzzzzz completely different", 8);
        let near_id = repo.seed_completed(course_id, "near.pdf", "close match", near);
        repo.seed_completed(course_id, "far.pdf", "unrelated", far);

        repo.push_rank_failure(Error::Internal("function does not exist".into()));

        let service = service(repo, model);
        let results = service.search(course_id, "close match", 5).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, near_id);
        assert!(results[0].similarity >= results[1].similarity);
        assert!((results[0].similarity - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_fallback_db_failure_is_search_error() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));

        repo.push_rank_failure(Error::Internal("primary down".into()));
        repo.push_list_failure(Error::Internal("db down".into()));

        let service = service(repo, model);
        let result = service.search(Uuid::new_v4(), "anything here", 5).await;
        assert!(matches!(result, Err(Error::Search(_))));
    }

    #[tokio::test]
    async fn test_fallback_respects_limit_and_tie_order() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));
        let course_id = Uuid::new_v4();

        // Identical embeddings: every score ties, so upload order decides.
        let shared = MockModelService::embedding_for("same", 8);
        let mut ids = Vec::new();
        for i in 0..7 {
            ids.push(repo.seed_completed(
                course_id,
                &format!("doc{}.pdf", i),
                "same text",
                shared.clone(),
            ));
        }
        repo.push_rank_failure(Error::Internal("primary down".into()));

        let service = service(repo, model);
        let results = service.search(course_id, "same", defaults::SEARCH_LIMIT).await.unwrap();

        assert_eq!(results.len(), defaults::SEARCH_LIMIT as usize);
        let returned: Vec<Uuid> = results.iter().map(|r| r.id).collect();
        assert_eq!(returned, ids[..defaults::SEARCH_LIMIT as usize]);
    }

    #[tokio::test]
    async fn test_per_call_limit_caps_both_paths() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));
        let course_id = Uuid::new_v4();

        let shared = MockModelService::embedding_for("same", 8);
        for i in 0..4 {
            repo.seed_completed(course_id, &format!("doc{}.pdf", i), "text", shared.clone());
        }
        repo.set_rank_results(vec![
            ranked(Uuid::new_v4(), "a.pdf", "x", 0.9),
            ranked(Uuid::new_v4(), "b.pdf", "y", 0.8),
            ranked(Uuid::new_v4(), "c.pdf", "z", 0.7),
        ]);

        let service = service(repo.clone(), model);

        // Primary path: the cap is pushed down to the ranking call.
        let results = service.search(course_id, "query", 2).await.unwrap();
        assert_eq!(results.len(), 2);

        // Fallback path: the same cap applies after local scoring.
        repo.push_rank_failure(Error::Internal("primary down".into()));
        let results = service.search(course_id, "query", 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_excerpt_truncation() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));

        let long_text = "x".repeat(600);
        let exact_text = "y".repeat(defaults::EXCERPT_LENGTH);
        repo.set_rank_results(vec![
            ranked(Uuid::new_v4(), "long.pdf", &long_text, 0.9),
            ranked(Uuid::new_v4(), "exact.pdf", &exact_text, 0.8),
            ranked(Uuid::new_v4(), "short.pdf", "short text", 0.7),
        ]);

        let service = service(repo, model);
        let results = service.search(Uuid::new_v4(), "query", 5).await.unwrap();

        assert_eq!(
            results[0].excerpt.chars().count(),
            defaults::EXCERPT_LENGTH + defaults::EXCERPT_ELLIPSIS.len()
        );
        assert!(results[0].excerpt.ends_with("..."));
        // Exactly at the limit: untouched, no ellipsis.
        assert_eq!(results[1].excerpt, exact_text);
        assert_eq!(results[2].excerpt, "short text");
    }

    #[tokio::test]
    async fn test_excerpt_respects_char_boundaries() {
        let repo = Arc::new(InMemoryMaterialRepository::new());
        let model = Arc::new(MockModelService::with_dimension(8));

        // Multibyte characters around the cut point must not split.
        let text = "é".repeat(520);
        repo.set_rank_results(vec![ranked(Uuid::new_v4(), "fr.pdf", &text, 0.9)]);

        let service = service(repo, model);
        let results = service.search(Uuid::new_v4(), "query", 5).await.unwrap();

        let excerpt = &results[0].excerpt;
        assert!(excerpt.ends_with("..."));
        assert_eq!(
            excerpt.chars().count(),
            defaults::EXCERPT_LENGTH + defaults::EXCERPT_ELLIPSIS.len()
        );
    }
}
