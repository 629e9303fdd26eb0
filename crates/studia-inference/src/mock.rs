//! Mock model service for deterministic testing.
//!
//! Implements [`ModelService`] with deterministic embeddings, scripted
//! failures, and a full call log so tests can assert on call counts (e.g.
//! "empty query makes zero embedding calls").

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use studia_core::{Error, ModelService, Result};

/// A single logged call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

/// Mock model service for testing.
#[derive(Clone)]
pub struct MockModelService {
    dimension: usize,
    extract_text: Arc<Mutex<String>>,
    extract_failures: Arc<Mutex<VecDeque<Error>>>,
    embed_failures: Arc<Mutex<VecDeque<Error>>>,
    latency: Arc<Mutex<Option<std::time::Duration>>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockModelService {
    /// Create a new mock with the default dimension.
    pub fn new() -> Self {
        Self::with_dimension(studia_core::defaults::EMBED_DIMENSION)
    }

    /// Create a new mock producing vectors of the given dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            extract_text: Arc::new(Mutex::new("mock extracted text".to_string())),
            extract_failures: Arc::new(Mutex::new(VecDeque::new())),
            embed_failures: Arc::new(Mutex::new(VecDeque::new())),
            latency: Arc::new(Mutex::new(None)),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the text every extraction returns.
    pub fn with_extract_text(self, text: impl Into<String>) -> Self {
        *self.extract_text.lock().unwrap() = text.into();
        self
    }

    /// Simulate latency on every call (for timeout tests).
    pub fn with_latency(self, latency: std::time::Duration) -> Self {
        *self.latency.lock().unwrap() = Some(latency);
        self
    }

    /// Queue an error for the next extraction call.
    pub fn push_extract_failure(&self, error: Error) {
        self.extract_failures.lock().unwrap().push_back(error);
    }

    /// Queue an error for the next embedding call.
    pub fn push_embed_failure(&self, error: Error) {
        self.embed_failures.lock().unwrap().push_back(error);
    }

    /// All logged calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of extraction calls made.
    pub fn extract_call_count(&self) -> usize {
        self.count_op("extract_text")
    }

    /// Number of embedding calls made.
    pub fn embed_call_count(&self) -> usize {
        self.count_op("generate_embedding")
    }

    fn count_op(&self, op: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == op)
            .count()
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
        });
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
    }

    /// Deterministic normalized embedding derived from the text content.
    pub fn embedding_for(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
        vec
    }
}

impl Default for MockModelService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelService for MockModelService {
    async fn extract_text(&self, _data: &[u8], file_name: &str) -> Result<String> {
        self.log_call("extract_text", file_name);
        self.simulate_latency().await;

        if let Some(err) = self.extract_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(self.extract_text.lock().unwrap().clone())
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyInput);
        }

        self.log_call("generate_embedding", trimmed);
        self.simulate_latency().await;

        if let Some(err) = self.embed_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(Self::embedding_for(trimmed, self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
