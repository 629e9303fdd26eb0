//! Concurrent aggregation of user context for prompt assembly.
//!
//! Three independent fetches (study preferences, academic profile, recent
//! chat history) run concurrently under one shared wall-clock budget. A slow
//! or failing fetch degrades that one component to absent; aggregation as a
//! whole never fails, because the chat must answer even with an empty
//! context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use studia_core::{defaults, ContextRepository, Result, UserContext};

/// Aggregation tuning knobs.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Shared budget for all three fetches together.
    pub budget: Duration,
    /// Maximum number of history messages included.
    pub history_limit: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(defaults::CONTEXT_TIMEOUT_MS),
            history_limit: defaults::HISTORY_LIMIT,
        }
    }
}

impl ContextConfig {
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }
}

/// Fans out the three context fetches and assembles whatever came back.
pub struct ContextAggregator {
    repo: Arc<dyn ContextRepository>,
    config: ContextConfig,
}

impl ContextAggregator {
    pub fn new(repo: Arc<dyn ContextRepository>) -> Self {
        Self::with_config(repo, ContextConfig::default())
    }

    pub fn with_config(repo: Arc<dyn ContextRepository>, config: ContextConfig) -> Self {
        Self { repo, config }
    }

    /// Gather the user's context for one course.
    ///
    /// Infallible: each fetch that errors or outlives the budget is reported
    /// absent through the presence flags.
    #[instrument(skip(self), fields(subsystem = "search", component = "context", user_id = %user_id, course_id = %course_id))]
    pub async fn aggregate(&self, user_id: Uuid, course_id: Uuid) -> UserContext {
        let start = Instant::now();
        let budget = self.config.budget;

        let prefs_repo = self.repo.clone();
        let prefs_task = tokio::spawn(async move { prefs_repo.preferences(user_id).await });

        let profile_repo = self.repo.clone();
        let profile_task =
            tokio::spawn(async move { profile_repo.academic_profile(user_id).await });

        let history_repo = self.repo.clone();
        let history_limit = self.config.history_limit;
        let history_task = tokio::spawn(async move {
            history_repo
                .recent_history(user_id, course_id, history_limit)
                .await
        });

        // All three run under the same budget concurrently, so total latency
        // is bounded by the budget, not three times it.
        let (prefs, profile, history) = tokio::join!(
            tokio::time::timeout(budget, prefs_task),
            tokio::time::timeout(budget, profile_task),
            tokio::time::timeout(budget, history_task),
        );

        let preferences = flatten(prefs, "preferences").flatten();
        let academic = flatten(profile, "academic_profile").flatten();
        let history = flatten(history, "history").unwrap_or_default();

        let context = UserContext::from_parts(preferences, academic, history);
        debug!(
            has_preferences = context.has_preferences,
            has_academic = context.has_academic,
            history_len = context.history.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Context aggregated"
        );
        context
    }
}

/// Collapse the timeout/join/fetch error layers into an `Option`, logging
/// which component degraded and why.
fn flatten<T>(
    outcome: std::result::Result<
        std::result::Result<Result<T>, tokio::task::JoinError>,
        tokio::time::error::Elapsed,
    >,
    component: &str,
) -> Option<T> {
    match outcome {
        Ok(Ok(Ok(value))) => Some(value),
        Ok(Ok(Err(e))) => {
            warn!(component, error = %e, "Context fetch failed");
            None
        }
        Ok(Err(e)) => {
            warn!(component, error = %e, "Context fetch panicked");
            None
        }
        Err(_) => {
            warn!(component, "Context fetch exceeded budget");
            None
        }
    }
}
