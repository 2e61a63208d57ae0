//! Bounded worker pool for ingestion runs

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use crate::error::{Error, Result};
use crate::ingestion::IngestionPipeline;

/// Queues document ids and runs ingestion on a bounded worker pool.
///
/// The pool size only bounds concurrency; correctness comes from the claim
/// transition inside the pipeline, so any number of workers is safe.
#[derive(Clone)]
pub struct IngestScheduler {
    sender: mpsc::Sender<String>,
}

impl IngestScheduler {
    /// Start the dispatcher and return a handle for enqueuing work
    pub fn start(
        pipeline: Arc<IngestionPipeline>,
        config: &crate::config::ProcessingConfig,
    ) -> Self {
        let workers = config.workers();
        let (sender, mut receiver) = mpsc::channel::<String>(config.queue_depth.max(1));
        let semaphore = Arc::new(Semaphore::new(workers));

        tokio::spawn(async move {
            tracing::info!("ingestion dispatcher started with {} workers", workers);
            while let Some(document_id) = receiver.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    pipeline.run(&document_id).await;
                    drop(permit);
                });
            }
            tracing::info!("ingestion dispatcher stopped");
        });

        Self { sender }
    }

    /// Enqueue a document for ingestion
    pub async fn enqueue(&self, document_id: String) -> Result<()> {
        self.sender
            .send(document_id)
            .await
            .map_err(|e| Error::store(format!("ingestion queue closed: {}", e)))
    }
}
