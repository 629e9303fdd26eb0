//! Material processor: drives one uploaded file from `pending` to a terminal
//! status.
//!
//! The pipeline is: fetch row, mark `processing`, download the blob, extract
//! text, embed, persist. Every failure mode ends in a `failed` row with an
//! error message; [`MaterialProcessor::process`] itself never returns an
//! error, so a crashing material cannot take down the worker loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pgvector::Vector;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use studia_core::{
    defaults, with_retry, BlobStore, Error, Material, MaterialRepository, ModelService, Result,
    RetryPolicy,
};

/// Processor tuning knobs.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Wall-clock budget for one material, covering download, extraction,
    /// and embedding together.
    pub processing_timeout: Duration,
    /// Retry policy for blob downloads.
    pub download_retry: RetryPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            processing_timeout: Duration::from_secs(defaults::PROCESSING_TIMEOUT_SECS),
            download_retry: RetryPolicy::default(),
        }
    }
}

impl ProcessorConfig {
    /// Read the timeout budget from `STUDIA_PROCESSING_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var("STUDIA_PROCESSING_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.processing_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.processing_timeout = timeout;
        self
    }
}

/// What one pipeline run produced; used for logging only.
enum PipelineOutcome {
    Embedded { text_len: usize },
    EmptyText,
}

/// Drives uploaded materials through extraction and embedding.
pub struct MaterialProcessor {
    materials: Arc<dyn MaterialRepository>,
    blobs: Arc<dyn BlobStore>,
    model: Arc<dyn ModelService>,
    config: ProcessorConfig,
}

impl MaterialProcessor {
    pub fn new(
        materials: Arc<dyn MaterialRepository>,
        blobs: Arc<dyn BlobStore>,
        model: Arc<dyn ModelService>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            materials,
            blobs,
            model,
            config,
        }
    }

    /// Process one material to a terminal status.
    ///
    /// Infallible by contract: all errors are absorbed into the material's
    /// `failed` status (or logged, when the row itself is unreachable).
    #[instrument(skip(self), fields(subsystem = "ingest", component = "processor", material_id = %material_id))]
    pub async fn process(&self, material_id: Uuid) {
        let start = Instant::now();

        let material = match self.materials.fetch(material_id).await {
            Ok(material) => material,
            Err(Error::MaterialNotFound(_)) => {
                // Deleted between enqueue and processing; nothing to update.
                warn!(material_id = %material_id, "Material vanished before processing");
                return;
            }
            Err(e) => {
                error!(material_id = %material_id, error = %e, "Failed to load material");
                return;
            }
        };

        // Best-effort: a failed status write here is not fatal, the terminal
        // write at the end still lands the row in the right state.
        if let Err(e) = self.materials.set_processing(material_id).await {
            warn!(material_id = %material_id, error = %e, "Failed to mark material processing");
        }

        let budget = self.config.processing_timeout;
        let outcome = tokio::time::timeout(budget, self.run_pipeline(&material)).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(Ok(PipelineOutcome::Embedded { text_len })) => {
                info!(
                    material_id = %material_id,
                    file_name = %material.file_name,
                    text_len,
                    duration_ms,
                    "Material processed"
                );
            }
            Ok(Ok(PipelineOutcome::EmptyText)) => {
                info!(
                    material_id = %material_id,
                    file_name = %material.file_name,
                    duration_ms,
                    "Material completed without embedding (no extractable text)"
                );
            }
            Ok(Err(e)) => {
                warn!(
                    material_id = %material_id,
                    file_name = %material.file_name,
                    error = %e,
                    duration_ms,
                    "Material processing failed"
                );
                self.record_failure(material_id, &format!("Processing failed: {}", e))
                    .await;
            }
            Err(_) => {
                warn!(
                    material_id = %material_id,
                    file_name = %material.file_name,
                    budget_secs = budget.as_secs(),
                    "Material processing exceeded budget"
                );
                self.record_failure(
                    material_id,
                    &format!("Processing timeout after {}s", budget.as_secs()),
                )
                .await;
            }
        }
    }

    /// The fallible middle of the pipeline, bounded by the caller's timeout.
    async fn run_pipeline(&self, material: &Material) -> Result<PipelineOutcome> {
        let data = with_retry(&self.config.download_retry, Error::is_transient, || {
            self.blobs.download(&material.file_path)
        })
        .await?;
        debug!(
            material_id = %material.id,
            byte_size = data.len(),
            "Blob downloaded"
        );

        let text = self.model.extract_text(&data, &material.file_name).await?;

        if text.trim().is_empty() {
            // Scanned images and empty documents extract to nothing. That is
            // a valid terminal state, not a failure; the material just never
            // participates in semantic search.
            self.materials.complete(material.id, &text, None).await?;
            return Ok(PipelineOutcome::EmptyText);
        }

        let embedding = self.model.generate_embedding(&text).await?;
        self.materials
            .complete(material.id, &text, Some(Vector::from(embedding)))
            .await?;

        Ok(PipelineOutcome::Embedded {
            text_len: text.len(),
        })
    }

    /// Best-effort failure write; a second error here can only be logged.
    async fn record_failure(&self, material_id: Uuid, message: &str) {
        if let Err(e) = self.materials.fail(material_id, message).await {
            error!(
                material_id = %material_id,
                error = %e,
                "Failed to record material failure"
            );
        }
    }
}
