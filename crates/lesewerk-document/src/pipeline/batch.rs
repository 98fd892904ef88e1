// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch orchestrator: runs the document pipeline over several documents and
// records each document's failure as an entry instead of stopping the batch.
//
// Document-level concurrency has its own budget, separate from the per-document
// page pool, so the two never multiply into an unbounded number of pages.

use std::sync::Arc;

use lesewerk_core::error::Result;
use lesewerk_core::types::{BatchEntry, BatchResult, DocumentFailure, DocumentRequest};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::pipeline::document::DocumentPipeline;

/// Error recorded for a document whose task ended without producing a result.
const ABORTED_DOCUMENT: &str = "document task aborted";

/// Runs batches of documents through one shared pipeline.
#[derive(Clone)]
pub struct BatchOrchestrator {
    pipeline: Arc<DocumentPipeline>,
    concurrency: usize,
}

impl BatchOrchestrator {
    /// Uses the pipeline's `batch_concurrency` setting.
    pub fn new(pipeline: Arc<DocumentPipeline>) -> Self {
        let concurrency = pipeline.config().batch_concurrency.max(1);
        Self {
            pipeline,
            concurrency,
        }
    }

    pub fn pipeline(&self) -> &Arc<DocumentPipeline> {
        &self.pipeline
    }

    /// Process `requests`, one result entry per request, in submission order.
    ///
    /// # Errors
    ///
    /// Returns `LesewerkError::EngineNotReady` when the recognition engine
    /// cannot be initialised; no document is attempted. Every other failure
    /// becomes a failed entry.
    #[instrument(skip_all, fields(documents = requests.len(), concurrency = self.concurrency))]
    pub async fn run_batch(&self, requests: Vec<DocumentRequest>) -> Result<BatchResult> {
        if let Err(err) = self.pipeline.ensure_engine().await {
            error!(error = %err, "Batch refused: engine unavailable");
            return Err(err);
        }

        let results = if self.concurrency <= 1 || requests.len() <= 1 {
            self.run_sequential(requests).await
        } else {
            self.run_concurrent(requests).await
        };

        let failed = results.iter().filter(|entry| entry.is_failed()).count();
        info!(documents = results.len(), failed, "Batch processed");
        Ok(BatchResult { results })
    }

    async fn run_sequential(&self, requests: Vec<DocumentRequest>) -> Vec<BatchEntry> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(run_one(&self.pipeline, request).await);
        }
        results
    }

    async fn run_concurrent(&self, requests: Vec<DocumentRequest>) -> Vec<BatchEntry> {
        let filenames: Vec<String> = requests
            .iter()
            .map(|request| request.filename().to_string())
            .collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            // The semaphore is never closed.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn(async move {
                let _permit = permit;
                (index, run_one(&pipeline, request).await)
            });
        }

        let mut slots: Vec<Option<BatchEntry>> = vec![None; filenames.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, entry)) => slots[index] = Some(entry),
                Err(err) => warn!(error = %err, "Document task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(filenames)
            .map(|(slot, filename)| {
                slot.unwrap_or_else(|| {
                    BatchEntry::Failed(DocumentFailure {
                        filename,
                        error: ABORTED_DOCUMENT.to_string(),
                    })
                })
            })
            .collect()
    }
}

async fn run_one(pipeline: &DocumentPipeline, request: DocumentRequest) -> BatchEntry {
    let filename = request.filename().to_string();
    match pipeline.run(request).await {
        Ok(result) => BatchEntry::Document(result),
        Err(err) => {
            error!(filename = %filename, error = %err, "Error processing document");
            BatchEntry::Failed(DocumentFailure {
                filename,
                error: err.to_string(),
            })
        }
    }
}
