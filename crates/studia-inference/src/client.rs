//! HTTP model-service client implementation.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use studia_core::{defaults, Error, ModelService, Result, RetryPolicy, with_retry};

/// Default model-serving runtime endpoint.
pub const DEFAULT_SERVICE_URL: &str = defaults::MODEL_SERVICE_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Default embedding dimension.
pub const DEFAULT_DIMENSION: usize = defaults::EMBED_DIMENSION;

/// HTTP client for the model-serving runtime.
///
/// Holds only configuration and the pooled `reqwest::Client`; one instance
/// is shared across the pipeline via `Arc<dyn ModelService>`.
pub struct HttpModelService {
    client: Client,
    base_url: String,
    embed_model: String,
    dimension: usize,
    extract_timeout: Duration,
    embed_timeout: Duration,
    retry: RetryPolicy,
}

impl HttpModelService {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_SERVICE_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_DIMENSION,
        )
    }

    /// Create a new client with custom configuration.
    pub fn with_config(base_url: String, embed_model: String, dimension: usize) -> Self {
        let client = Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        info!(
            subsystem = "inference",
            component = "model_service",
            "Initializing model-service client: url={}, embed={}, dim={}",
            base_url,
            embed_model,
            dimension
        );

        Self {
            client,
            base_url,
            embed_model,
            dimension,
            extract_timeout: Duration::from_secs(defaults::EXTRACT_TIMEOUT_SECS),
            embed_timeout: Duration::from_secs(defaults::EMBED_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `STUDIA_MODEL_SERVICE_URL` | `http://127.0.0.1:11434` |
    /// | `STUDIA_EMBED_MODEL` | `mxbai-embed-large` |
    /// | `STUDIA_EMBED_DIM` | `1024` |
    /// | `STUDIA_EXTRACT_TIMEOUT_SECS` | `120` |
    /// | `STUDIA_EMBED_TIMEOUT_SECS` | `30` |
    pub fn from_env() -> Self {
        let base_url = std::env::var("STUDIA_MODEL_SERVICE_URL")
            .unwrap_or_else(|_| DEFAULT_SERVICE_URL.to_string());
        let embed_model = std::env::var("STUDIA_EMBED_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let dimension = std::env::var("STUDIA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);

        let mut service = Self::with_config(base_url, embed_model, dimension);

        if let Some(secs) = std::env::var("STUDIA_EXTRACT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            service.extract_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = std::env::var("STUDIA_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            service.embed_timeout = Duration::from_secs(secs);
        }

        service
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-request timeouts.
    pub fn with_timeouts(mut self, extract: Duration, embed: Duration) -> Self {
        self.extract_timeout = extract;
        self.embed_timeout = embed;
        self
    }

    /// Check that the runtime is reachable.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Model-service health check passed");
                    Ok(true)
                } else {
                    warn!("Model-service health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Model-service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// One extraction request, no retry.
    async fn post_extract(&self, payload: &ExtractRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/extract", self.base_url))
            .timeout(self.extract_timeout)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let result: ExtractResponse = response
            .json()
            .await
            .map_err(|e| Error::Permanent(format!("Failed to parse extract response: {}", e)))?;

        Ok(result.text)
    }

    /// One embedding request, no retry.
    async fn post_embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: self.embed_model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(self.embed_timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Permanent(format!("Failed to parse embed response: {}", e)))?;

        let vector = result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Permanent("Embed response contained no vectors".to_string()))?;

        if vector.len() != self.dimension {
            // Vector column width and model output must agree; this is a
            // deployment configuration error, not retryable.
            return Err(Error::Config(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }

        Ok(vector)
    }
}

impl Default for HttpModelService {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an HTTP error status into the retry taxonomy.
fn classify_status(status: reqwest::StatusCode, body: &str) -> Error {
    if status.is_server_error() {
        Error::Transient(format!("model service returned {}: {}", status, body))
    } else {
        Error::Permanent(format!("model service returned {}: {}", status, body))
    }
}

/// Request payload for `/api/extract`.
#[derive(Serialize)]
struct ExtractRequest {
    file_name: String,
    /// Base64-encoded file bytes.
    data: String,
}

/// Response from `/api/extract`.
#[derive(Deserialize)]
struct ExtractResponse {
    text: String,
}

/// Request payload for `/api/embed`.
#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

/// Response from `/api/embed`.
#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl ModelService for HttpModelService {
    #[instrument(skip(self, data), fields(subsystem = "inference", component = "model_service", op = "extract_text", file_name = %file_name, byte_size = data.len()))]
    async fn extract_text(&self, data: &[u8], file_name: &str) -> Result<String> {
        let start = Instant::now();

        // Base64 encoding of a large upload is CPU-bound; keep it off the
        // event loop.
        let bytes = data.to_vec();
        let encoded = tokio::task::spawn_blocking(move || {
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        })
        .await
        .map_err(|e| Error::Internal(format!("base64 encode task failed: {}", e)))?;

        let payload = ExtractRequest {
            file_name: file_name.to_string(),
            data: encoded,
        };

        // A hard timeout on extraction means the input is too large or
        // complex to recover within the same call, so timeouts are not
        // retried here.
        let text = with_retry(
            &self.retry,
            |e| matches!(e, Error::Transient(_)),
            || self.post_extract(&payload),
        )
        .await?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = text.len(),
            duration_ms = elapsed,
            "Extraction complete"
        );
        if elapsed > 30_000 {
            warn!(duration_ms = elapsed, slow = true, "Slow extraction");
        }
        Ok(text)
    }

    #[instrument(skip(self, text), fields(subsystem = "inference", component = "model_service", op = "embed", model = %self.embed_model, input_len = text.len()))]
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyInput);
        }

        let start = Instant::now();

        // Embeddings are expected to be fast, so a timeout is treated as
        // transient and retried alongside network/5xx failures.
        let vector = with_retry(&self.retry, Error::is_transient, || {
            self.post_embed(trimmed)
        })
        .await?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(duration_ms = elapsed, "Embedding complete");
        if elapsed > 5_000 {
            warn!(duration_ms = elapsed, slow = true, "Slow embedding");
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_SERVICE_URL, "http://127.0.0.1:11434");
        assert_eq!(DEFAULT_EMBED_MODEL, "mxbai-embed-large");
        assert_eq!(DEFAULT_DIMENSION, 1024);
    }

    #[test]
    fn test_default_config() {
        let service = HttpModelService::new();
        assert_eq!(service.base_url, DEFAULT_SERVICE_URL);
        assert_eq!(service.embed_model, DEFAULT_EMBED_MODEL);
        assert_eq!(service.dimension, DEFAULT_DIMENSION);
        assert_eq!(
            service.extract_timeout,
            Duration::from_secs(defaults::EXTRACT_TIMEOUT_SECS)
        );
        assert_eq!(
            service.embed_timeout,
            Duration::from_secs(defaults::EMBED_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_custom_config() {
        let service = HttpModelService::with_config(
            "http://custom:1234".to_string(),
            "custom-embed".to_string(),
            512,
        );
        assert_eq!(service.base_url, "http://custom:1234");
        assert_eq!(service.embed_model, "custom-embed");
        assert_eq!(service.dimension(), 512);
    }

    #[test]
    fn test_with_timeouts() {
        let service = HttpModelService::new()
            .with_timeouts(Duration::from_secs(10), Duration::from_secs(2));
        assert_eq!(service.extract_timeout, Duration::from_secs(10));
        assert_eq!(service.embed_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_classify_status_5xx_transient() {
        let err = classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, Error::Transient(_)));
        let err = classify_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "busy");
        assert!(matches!(err, Error::Transient(_)));
    }

    #[test]
    fn test_classify_status_4xx_permanent() {
        let err = classify_status(reqwest::StatusCode::BAD_REQUEST, "malformed");
        assert!(matches!(err, Error::Permanent(_)));
        let err = classify_status(reqwest::StatusCode::NOT_FOUND, "no such model");
        assert!(matches!(err, Error::Permanent(_)));
    }

    #[test]
    fn test_extract_request_serialization() {
        let request = ExtractRequest {
            file_name: "notes.pdf".to_string(),
            data: "aGVsbG8=".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("notes.pdf"));
        assert!(json.contains("aGVsbG8="));
    }

    #[test]
    fn test_embed_request_serialization() {
        let request = EmbedRequest {
            model: "test-model".to_string(),
            input: vec!["hello".to_string()],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("test-model"));
        assert!(json.contains("hello"));
    }

    #[test]
    fn test_embed_response_deserialization() {
        let json = r#"{"embeddings": [[0.1, 0.2, 0.3]]}"#;
        let response: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.embeddings.len(), 1);
        assert_eq!(response.embeddings[0], vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_extract_response_deserialization() {
        let json = r#"{"text": "chapter one"}"#;
        let response: ExtractResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text, "chapter one");
    }

    #[tokio::test]
    async fn test_empty_input_fails_without_network() {
        // Unroutable base URL: if a request were attempted this would hang
        // or error differently.
        let service = HttpModelService::with_config(
            "http://192.0.2.1:1".to_string(),
            "model".to_string(),
            8,
        );

        let result = service.generate_embedding("").await;
        assert!(matches!(result, Err(Error::EmptyInput)));

        let result = service.generate_embedding("   \n\t  ").await;
        assert!(matches!(result, Err(Error::EmptyInput)));
    }
}

/// Integration tests that require a live model-serving runtime.
/// Run with: cargo test --package studia-inference --features integration
#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let service = HttpModelService::from_env();
        let healthy = service.health_check().await.expect("health check failed");
        assert!(healthy, "Model service should be reachable");
    }

    #[tokio::test]
    async fn test_embed_returns_configured_dimension() {
        let service = HttpModelService::from_env();
        let vector = service
            .generate_embedding("The mitochondria is the powerhouse of the cell.")
            .await
            .expect("embedding failed");
        assert_eq!(vector.len(), service.dimension());
        assert!(vector.iter().all(|x| x.is_finite()));
        assert!(vector.iter().any(|x| *x != 0.0));
    }
}
