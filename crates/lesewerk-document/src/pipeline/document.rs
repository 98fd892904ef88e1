// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document pipeline: rasterize, fan pages out over a bounded worker pool,
// and reassemble the page results in page order.
//
// The worker pool size is fixed by configuration, not by page count. It caps
// how many decoded pages are held at once and how hard the shared engine is
// driven. Pages finish in any order; results are slotted by page number.

use std::sync::Arc;

use lesewerk_core::config::{EmptyDocumentPolicy, PipelineConfig};
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::{DocumentRequest, DocumentResult, PageResult};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{Engine, EngineHandle};
use crate::pipeline::page::PageProcessor;
use crate::raster::{PageImage, Rasterizer};

/// Error recorded for a page whose task ended without producing a result.
const ABORTED_PAGE: &str = "page task aborted";

/// Runs one document from bytes to per-page text.
pub struct DocumentPipeline {
    rasterizer: Arc<dyn Rasterizer>,
    engine: Arc<EngineHandle>,
    config: Arc<PipelineConfig>,
}

impl DocumentPipeline {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        engine: Arc<EngineHandle>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            rasterizer,
            engine,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine_handle(&self) -> &Arc<EngineHandle> {
        &self.engine
    }

    /// Initialise the shared engine off the async runtime, or return the
    /// already-initialised one.
    pub async fn ensure_engine(&self) -> Result<Engine> {
        let handle = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || handle.ensure_ready())
            .await
            .map_err(|err| {
                LesewerkError::EngineNotReady(format!("engine initialisation task aborted: {err}"))
            })?
    }

    /// Extract text from every page of `request`.
    ///
    /// Page failures are recorded on the page and never fail the call.
    ///
    /// # Errors
    ///
    /// - [`LesewerkError::InvalidRequest`] / [`LesewerkError::UnsupportedDocument`]
    ///   if the request fails validation.
    /// - [`LesewerkError::EngineNotReady`] if the recognition engine cannot be
    ///   initialised. This error is cached and returned to every later call.
    /// - [`LesewerkError::Decode`] if the bytes cannot be rasterized, and
    ///   [`LesewerkError::EmptyDocument`] if they yield no pages under the
    ///   reject policy.
    #[instrument(skip_all, fields(filename = request.filename(), kind = ?request.kind()))]
    pub async fn run(&self, request: DocumentRequest) -> Result<DocumentResult> {
        request.validate(self.config.strict_extensions)?;
        let engine = self.ensure_engine().await?;
        let (bytes, filename, kind) = request.into_parts();

        let rasterizer = Arc::clone(&self.rasterizer);
        let rasterized = tokio::task::spawn_blocking(move || rasterizer.rasterize(&bytes, kind))
            .await
            .map_err(|err| LesewerkError::Document {
                filename: filename.clone(),
                message: format!("rasterization task aborted: {err}"),
            })?;

        let pages = match rasterized {
            Ok(pages) => pages,
            Err(LesewerkError::EmptyDocument)
                if self.config.empty_document_policy == EmptyDocumentPolicy::Accept =>
            {
                warn!(filename = %filename, "Document has no pages");
                return Ok(DocumentResult::empty(filename));
            }
            Err(err) => {
                error!(filename = %filename, error = %err, "Rasterization failed");
                return Err(err);
            }
        };

        let total_pages = pages.len();
        info!(filename = %filename, total_pages, "Converted document to pages");

        let processor = PageProcessor::new(engine, self.config.max_dimension);
        let results = if total_pages <= 1 {
            process_inline(processor, pages).await
        } else {
            process_parallel(processor, pages, self.config.page_workers).await
        };

        let result = DocumentResult {
            filename,
            total_pages,
            pages: results,
        };
        info!(
            filename = %result.filename,
            total_pages,
            failed_pages = result.failed_page_count(),
            "Document processed"
        );
        Ok(result)
    }
}

/// Single-page documents skip the worker pool.
async fn process_inline(processor: PageProcessor, pages: Vec<PageImage>) -> Vec<PageResult> {
    let total = pages.len();
    let joined = tokio::task::spawn_blocking(move || {
        pages
            .into_iter()
            .map(|page| processor.process(page))
            .collect::<Vec<_>>()
    })
    .await;

    match joined {
        Ok(results) => results,
        Err(err) => {
            warn!(error = %err, "Page task aborted");
            fill_gaps(vec![None; total])
        }
    }
}

async fn process_parallel(
    processor: PageProcessor,
    pages: Vec<PageImage>,
    page_workers: usize,
) -> Vec<PageResult> {
    let total = pages.len();
    let workers = page_workers.clamp(1, total);
    debug!(workers, total, "Fanning out pages");

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for page in pages {
        // The semaphore is never closed.
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let processor = processor.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            processor.process(page)
        });
    }

    let mut slots: Vec<Option<PageResult>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                let slot = (result.page_number as usize)
                    .checked_sub(1)
                    .and_then(|index| slots.get_mut(index));
                match slot {
                    Some(slot) => *slot = Some(result),
                    None => warn!(page_number = result.page_number, "Page number out of range"),
                }
            }
            Err(err) => warn!(error = %err, "Page task aborted"),
        }
    }

    fill_gaps(slots)
}

/// Replace every missing slot with an error record so positions stay intact.
fn fill_gaps(slots: Vec<Option<PageResult>>) -> Vec<PageResult> {
    slots
        .into_iter()
        .zip(1u32..)
        .map(|(slot, page_number)| {
            slot.unwrap_or_else(|| PageResult::failed(page_number, ABORTED_PAGE))
        })
        .collect()
}
