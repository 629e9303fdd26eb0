//! Course material repository: status transitions and similarity ranking.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use studia_core::{Error, Material, MaterialRepository, ProcessingStatus, RankedMaterial, Result};

/// PostgreSQL-backed material repository.
pub struct PgMaterialRepository {
    pool: PgPool,
}

impl PgMaterialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All materials for a course, newest first. Used by listing endpoints.
    pub async fn list_by_course(&self, course_id: Uuid) -> Result<Vec<Material>> {
        let rows = sqlx::query(
            r#"
            SELECT id, course_id, file_name, file_path, file_type, file_size,
                   processing_status, extracted_text, embedding, processed_at,
                   error_message, created_at, updated_at
            FROM course_materials
            WHERE course_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(map_material_rows(rows))
    }

    /// Insert a freshly uploaded material in `pending` status.
    pub async fn insert_pending(
        &self,
        course_id: Uuid,
        file_name: &str,
        file_path: &str,
        file_type: &str,
        file_size: i64,
    ) -> Result<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO course_materials
                (course_id, file_name, file_path, file_type, file_size, processing_status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id
            "#,
        )
        .bind(course_id)
        .bind(file_name)
        .bind(file_path)
        .bind(file_type)
        .bind(file_size)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// Delete a material row. The blob is the caller's responsibility.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM course_materials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MaterialNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl MaterialRepository for PgMaterialRepository {
    async fn fetch(&self, id: Uuid) -> Result<Material> {
        let row = sqlx::query(
            r#"
            SELECT id, course_id, file_name, file_path, file_type, file_size,
                   processing_status, extracted_text, embedding, processed_at,
                   error_message, created_at, updated_at
            FROM course_materials
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => material_from_row(&row),
            None => Err(Error::MaterialNotFound(id)),
        }
    }

    #[instrument(skip(self), fields(subsystem = "database", component = "materials"))]
    async fn set_processing(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE course_materials
            SET processing_status = 'processing',
                error_message = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MaterialNotFound(id));
        }
        debug!(material_id = %id, "Material marked processing");
        Ok(())
    }

    #[instrument(skip(self, extracted_text, embedding), fields(subsystem = "database", component = "materials", text_len = extracted_text.len(), has_embedding = embedding.is_some()))]
    async fn complete(
        &self,
        id: Uuid,
        extracted_text: &str,
        embedding: Option<Vector>,
    ) -> Result<()> {
        // processed_at is set exactly once; a reprocessed material keeps its
        // original completion timestamp.
        let result = sqlx::query(
            r#"
            UPDATE course_materials
            SET processing_status = 'completed',
                extracted_text = $2,
                embedding = $3,
                processed_at = COALESCE(processed_at, now()),
                error_message = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(extracted_text)
        .bind(embedding)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MaterialNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self, error_message), fields(subsystem = "database", component = "materials"))]
    async fn fail(&self, id: Uuid, error_message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE course_materials
            SET processing_status = 'failed',
                error_message = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MaterialNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self, query), fields(subsystem = "database", component = "materials", op = "rank_similar"))]
    async fn rank_similar(
        &self,
        course_id: Uuid,
        query: &Vector,
        limit: i64,
    ) -> Result<Vec<RankedMaterial>> {
        // Ranking happens inside the database via the pgvector cosine
        // distance operator, wrapped in a SQL function so index usage is
        // consistent across callers.
        let rows = sqlx::query(
            r#"
            SELECT id, file_name, extracted_text, file_type, similarity
            FROM rank_course_materials($1, $2::vector, $3)
            "#,
        )
        .bind(course_id)
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut ranked = Vec::with_capacity(rows.len());
        for row in rows {
            ranked.push(RankedMaterial {
                id: row.try_get("id")?,
                file_name: row.try_get("file_name")?,
                extracted_text: row.try_get("extracted_text")?,
                file_type: row.try_get("file_type")?,
                similarity: row.try_get::<f64, _>("similarity")? as f32,
            });
        }
        Ok(ranked)
    }

    async fn list_completed_embedded(&self, course_id: Uuid) -> Result<Vec<Material>> {
        let rows = sqlx::query(
            r#"
            SELECT id, course_id, file_name, file_path, file_type, file_size,
                   processing_status, extracted_text, embedding, processed_at,
                   error_message, created_at, updated_at
            FROM course_materials
            WHERE course_id = $1
              AND processing_status = 'completed'
              AND embedding IS NOT NULL
              AND extracted_text IS NOT NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(map_material_rows(rows))
    }
}

/// Map rows, skipping any that fail to decode so one malformed row does not
/// take down a whole listing.
fn map_material_rows(rows: Vec<PgRow>) -> Vec<Material> {
    rows.iter()
        .filter_map(|row| match material_from_row(row) {
            Ok(material) => Some(material),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable material row");
                None
            }
        })
        .collect()
}

fn material_from_row(row: &PgRow) -> Result<Material> {
    let status: String = row.try_get("processing_status")?;
    let processing_status: ProcessingStatus = status
        .parse()
        .map_err(|_| Error::Internal(format!("unknown processing_status: {}", status)))?;

    Ok(Material {
        id: row.try_get("id")?,
        course_id: row.try_get("course_id")?,
        file_name: row.try_get("file_name")?,
        file_path: row.try_get("file_path")?,
        file_type: row.try_get("file_type")?,
        file_size: row.try_get("file_size")?,
        processing_status,
        extracted_text: row.try_get("extracted_text")?,
        embedding: row.try_get("embedding")?,
        processed_at: row.try_get("processed_at")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
