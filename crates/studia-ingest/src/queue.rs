//! Ingestion queue and worker loop.
//!
//! Uploads enqueue material ids; a single worker task fans them out to a
//! bounded set of concurrent [`MaterialProcessor`] runs. An id already in
//! flight is skipped rather than processed twice.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use studia_core::{defaults, Error, Result};

use crate::processor::MaterialProcessor;

/// Configuration for the ingest worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of materials processed concurrently.
    pub max_concurrent: usize,
    /// Capacity of the enqueue channel.
    pub queue_capacity: usize,
    /// Whether to enable processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::INGEST_MAX_CONCURRENT,
            queue_capacity: defaults::INGEST_QUEUE_CAPACITY,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `STUDIA_INGEST_ENABLED` | `true` | Enable/disable processing |
    /// | `STUDIA_INGEST_MAX_CONCURRENT` | `4` | Max concurrent materials |
    /// | `STUDIA_INGEST_QUEUE_CAPACITY` | `256` | Enqueue channel capacity |
    pub fn from_env() -> Self {
        let enabled = std::env::var("STUDIA_INGEST_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent = std::env::var("STUDIA_INGEST_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::INGEST_MAX_CONCURRENT)
            .max(1);

        let queue_capacity = std::env::var("STUDIA_INGEST_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::INGEST_QUEUE_CAPACITY)
            .max(1);

        Self {
            max_concurrent,
            queue_capacity,
            enabled,
        }
    }

    /// Set maximum concurrent materials.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Enable or disable processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the ingest worker.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    /// A material was accepted into the queue.
    Enqueued { material_id: Uuid },
    /// Processing started for a material.
    Started { material_id: Uuid },
    /// Processing finished (the terminal status lives on the row).
    Finished { material_id: Uuid },
    /// A duplicate enqueue was dropped because the id is already in flight.
    Skipped { material_id: Uuid },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Sending half handed to the upload path.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<Uuid>,
    event_tx: broadcast::Sender<IngestEvent>,
}

impl IngestQueue {
    /// Enqueue a material for processing.
    ///
    /// Fails only when the queue is full or the worker is gone; the upload
    /// path surfaces that as a retryable condition.
    pub fn enqueue(&self, material_id: Uuid) -> Result<()> {
        self.tx.try_send(material_id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Transient("ingest queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::Internal("ingest worker is not running".to_string())
            }
        })?;
        let _ = self.event_tx.send(IngestEvent::Enqueued { material_id });
        debug!(material_id = %material_id, "Material enqueued");
        Ok(())
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<IngestEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<IngestEvent> {
        self.event_rx.resubscribe()
    }
}

/// Worker that drains the ingest queue.
pub struct IngestWorker {
    processor: Arc<MaterialProcessor>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<IngestEvent>,
}

impl IngestWorker {
    pub fn new(processor: Arc<MaterialProcessor>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            processor,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<IngestEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker loop; returns the enqueue handle and control handle.
    pub fn start(self) -> (IngestQueue, WorkerHandle) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let queue = IngestQueue {
            tx,
            event_tx: self.event_tx.clone(),
        };
        let handle = WorkerHandle {
            shutdown_tx,
            event_rx: self.event_tx.subscribe(),
        };

        tokio::spawn(async move {
            self.run(rx, shutdown_rx).await;
        });

        (queue, handle)
    }

    #[instrument(skip_all, fields(subsystem = "ingest", component = "worker"))]
    async fn run(self, mut rx: mpsc::Receiver<Uuid>, mut shutdown_rx: mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Ingest worker is disabled, not starting");
            return;
        }

        info!(
            max_concurrent = self.config.max_concurrent,
            queue_capacity = self.config.queue_capacity,
            "Ingest worker started"
        );
        let _ = self.event_tx.send(IngestEvent::WorkerStarted);

        let mut in_flight: HashSet<Uuid> = HashSet::new();
        let mut tasks: JoinSet<Uuid> = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Ingest worker received shutdown signal");
                    break;
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    self.reap(result, &mut in_flight);
                }
                maybe_id = rx.recv(), if tasks.len() < self.config.max_concurrent => {
                    let Some(material_id) = maybe_id else {
                        info!("Ingest queue closed");
                        break;
                    };

                    if !in_flight.insert(material_id) {
                        // Already being processed; the row will reach a
                        // terminal status from the run in flight.
                        warn!(material_id = %material_id, "Duplicate enqueue skipped");
                        let _ = self.event_tx.send(IngestEvent::Skipped { material_id });
                        continue;
                    }

                    let _ = self.event_tx.send(IngestEvent::Started { material_id });
                    let processor = self.processor.clone();
                    tasks.spawn(async move {
                        processor.process(material_id).await;
                        material_id
                    });
                }
            }
        }

        // Drain in-flight materials before stopping so none are left stuck
        // in `processing`.
        while let Some(result) = tasks.join_next().await {
            self.reap(result, &mut in_flight);
        }

        let _ = self.event_tx.send(IngestEvent::WorkerStopped);
        info!("Ingest worker stopped");
    }

    fn reap(
        &self,
        result: std::result::Result<Uuid, tokio::task::JoinError>,
        in_flight: &mut HashSet<Uuid>,
    ) {
        match result {
            Ok(material_id) => {
                in_flight.remove(&material_id);
                let _ = self.event_tx.send(IngestEvent::Finished { material_id });
            }
            Err(e) => {
                // The processor is infallible by contract, so this is a panic
                // in the pipeline. The id is unknown here; the in-flight set
                // self-heals when the worker restarts.
                error!(error = ?e, "Material processing task panicked");
            }
        }
    }
}
