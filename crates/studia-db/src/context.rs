//! User context repository: study preferences, academic profile, and recent
//! chat history for prompt assembly.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use studia_core::{AcademicProfile, ContextRepository, HistoryMessage, Result, StudyPreferences};

/// PostgreSQL-backed context repository.
pub struct PgContextRepository {
    pool: PgPool,
}

impl PgContextRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextRepository for PgContextRepository {
    async fn preferences(&self, user_id: Uuid) -> Result<Option<StudyPreferences>> {
        let row = sqlx::query(
            r#"
            SELECT learning_style, explanation_depth, tone, language
            FROM study_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(StudyPreferences {
                learning_style: row.try_get("learning_style")?,
                explanation_depth: row.try_get("explanation_depth")?,
                tone: row.try_get("tone")?,
                language: row.try_get("language")?,
            })
        })
        .transpose()
    }

    async fn academic_profile(&self, user_id: Uuid) -> Result<Option<AcademicProfile>> {
        let row = sqlx::query(
            r#"
            SELECT grade_level, subjects, strengths, weaknesses
            FROM academic_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(AcademicProfile {
                grade_level: row.try_get("grade_level")?,
                subjects: row.try_get("subjects")?,
                strengths: row.try_get("strengths")?,
                weaknesses: row.try_get("weaknesses")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(subsystem = "database", component = "context"))]
    async fn recent_history(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        limit: i64,
    ) -> Result<Vec<HistoryMessage>> {
        // Newest N messages, returned oldest-first so the prompt reads in
        // conversation order.
        let rows = sqlx::query(
            r#"
            SELECT role, content, created_at
            FROM chat_messages
            WHERE user_id = $1 AND course_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            messages.push(HistoryMessage {
                role: row.try_get("role")?,
                content: row.try_get("content")?,
                created_at: row.try_get("created_at")?,
            });
        }
        messages.reverse();
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    //! Requires a PostgreSQL instance; run with `DATABASE_URL` and `--ignored`.

    use super::*;

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/studia_test".to_string());
        crate::pool::create_pool(&url).await.unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn test_missing_preferences_is_none() {
        let pool = test_pool().await;
        let repo = PgContextRepository::new(pool);

        let prefs = repo.preferences(Uuid::new_v4()).await.unwrap();
        assert!(prefs.is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_missing_profile_is_none() {
        let pool = test_pool().await;
        let repo = PgContextRepository::new(pool);

        let profile = repo.academic_profile(Uuid::new_v4()).await.unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_history_empty_for_new_user() {
        let pool = test_pool().await;
        let repo = PgContextRepository::new(pool);

        let history = repo
            .recent_history(Uuid::new_v4(), Uuid::new_v4(), 10)
            .await
            .unwrap();
        assert!(history.is_empty());
    }
}
