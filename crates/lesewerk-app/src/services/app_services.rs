// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Composition root: builds the pipeline once and exposes the operations the
// CLI needs.
//
// The recognition engine is not loaded here. It is created by the first
// document (or `status --init`) and then shared by every later call.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lesewerk_core::PipelineConfig;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::{
    AcceleratorReport, BatchEntry, BatchResult, DocumentFailure, DocumentRequest, DocumentResult,
    EngineStatus, HealthReport,
};
use lesewerk_document::{
    BatchOrchestrator, DocumentPipeline, DocumentRasterizer, EngineHandle, Rasterizer,
    RecognitionBackend,
};
use tracing::{debug, error, info, warn};

use super::config_dir;
use crate::cli::ConfigOverrides;

/// Download timeout for URL sources.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a single document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Url(String),
}

impl DocumentSource {
    /// `http://` and `https://` sources are URLs; anything else is a path.
    pub fn parse(source: &str) -> Self {
        let lower = source.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(source.to_string())
        } else {
            Self::Path(PathBuf::from(source))
        }
    }

    /// Reported filename: the explicit one, else one derived from the source.
    pub fn filename(&self, explicit: Option<String>) -> String {
        match self {
            Self::Path(path) => request_filename(path, explicit),
            Self::Url(url) => explicit
                .unwrap_or_else(|| DocumentRequest::default_filename_for(url).to_string()),
        }
    }
}

/// Shared application services. Cheaply cloneable.
#[derive(Clone)]
pub struct AppServices {
    pipeline: Arc<DocumentPipeline>,
    batch: BatchOrchestrator,
}

impl AppServices {
    /// Initialise all services from the config file and CLI overrides.
    pub fn init(overrides: &ConfigOverrides) -> Result<Self> {
        let config = load_config(overrides)?;
        info!(
            dpi = config.effective_dpi(),
            max_dimension = config.max_dimension,
            page_workers = config.page_workers,
            batch_concurrency = config.batch_concurrency,
            serialize_recognition = config.serialize_recognition,
            "Initialising app services"
        );

        let engine = EngineHandle::new(
            engine_factory(&config),
            config.serialize_recognition,
        );
        let rasterizer = DocumentRasterizer::with_default_backend(config.effective_dpi());
        Ok(Self::from_parts(Arc::new(rasterizer), engine, config))
    }

    /// Assemble services around an explicit rasterizer and engine.
    pub fn from_parts(
        rasterizer: Arc<dyn Rasterizer>,
        engine: EngineHandle,
        config: PipelineConfig,
    ) -> Self {
        let pipeline = Arc::new(DocumentPipeline::new(rasterizer, Arc::new(engine), config));
        let batch = BatchOrchestrator::new(Arc::clone(&pipeline));
        Self { pipeline, batch }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    // -- Documents -----------------------------------------------------------

    /// Extract text from one document.
    ///
    /// `filename` is the name reported in the result; without it the name is
    /// derived from `source`.
    pub async fn extract(
        &self,
        source: &DocumentSource,
        filename: Option<String>,
    ) -> Result<DocumentResult> {
        let request = read_source(source, filename).await?;
        self.pipeline.run(request).await
    }

    /// Like [`extract`](Self::extract), but a document-level failure becomes
    /// a [`BatchEntry::Failed`] carrying the filename and error text.
    ///
    /// # Errors
    ///
    /// Only errors that leave the process unusable are returned; see
    /// [`LesewerkError::is_process_fatal`].
    pub async fn extract_entry(
        &self,
        source: &DocumentSource,
        filename: Option<String>,
    ) -> Result<BatchEntry> {
        let reported = source.filename(filename.clone());
        match self.extract(source, filename).await {
            Ok(result) => Ok(BatchEntry::Document(result)),
            Err(err) if err.is_process_fatal() => Err(err),
            Err(err) => {
                error!(filename = %reported, error = %err, "Document failed");
                Ok(BatchEntry::Failed(DocumentFailure {
                    filename: reported,
                    error: err.to_string(),
                }))
            }
        }
    }

    /// Extract text from every file in `paths`, in order.
    ///
    /// A file that cannot be read becomes a failed entry; the rest of the
    /// batch still runs.
    pub async fn extract_batch(&self, paths: &[PathBuf]) -> Result<BatchResult> {
        let mut slots: Vec<Option<BatchEntry>> = Vec::with_capacity(paths.len());
        let mut requests = Vec::new();

        for path in paths {
            match read_request(path, None).await {
                Ok(request) => {
                    slots.push(None);
                    requests.push(request);
                }
                Err(err) => {
                    error!(path = %path.display(), error = %err, "Cannot read document");
                    slots.push(Some(BatchEntry::Failed(DocumentFailure {
                        filename: request_filename(path, None),
                        error: err.to_string(),
                    })));
                }
            }
        }

        let mut processed = self.batch.run_batch(requests).await?.results.into_iter();
        let results = slots
            .into_iter()
            .filter_map(|slot| slot.or_else(|| processed.next()))
            .collect();
        Ok(BatchResult { results })
    }

    // -- Health --------------------------------------------------------------

    /// Engine health. With `init`, the engine is initialised first.
    pub async fn health(&self, init: bool) -> HealthReport {
        if init {
            if let Err(err) = self.pipeline.ensure_engine().await {
                warn!(error = %err, "Engine initialisation failed");
            }
        }

        let handle = self.pipeline.engine_handle();
        let status = handle.status();
        let available = match status {
            EngineStatus::Ready => handle
                .ensure_ready()
                .map(|engine| engine.accelerator_available())
                .unwrap_or(false),
            _ => false,
        };
        HealthReport::new(
            &status,
            AcceleratorReport {
                requested: self.config().engine.accelerator_enabled,
                available,
            },
        )
    }
}

// -- Config --------------------------------------------------------------------

/// Config file (explicit, or the default location when present) with CLI
/// overrides applied on top.
pub fn load_config(overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let path = overrides
        .config
        .clone()
        .or_else(config_dir::default_config_file);

    let mut config = match &path {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            PipelineConfig::from_json_file(path).map_err(|err| {
                LesewerkError::Config(format!("{}: {}", path.display(), err))
            })?
        }
        None => PipelineConfig::default(),
    };

    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "ocr")]
fn engine_factory(
    config: &PipelineConfig,
) -> impl Fn() -> Result<Arc<dyn RecognitionBackend>> + Send + Sync + 'static {
    lesewerk_document::OcrsBackend::factory(config.engine.clone())
}

#[cfg(not(feature = "ocr"))]
fn engine_factory(
    _config: &PipelineConfig,
) -> impl Fn() -> Result<Arc<dyn RecognitionBackend>> + Send + Sync + 'static {
    || {
        Err(LesewerkError::EngineNotReady(
            "built without the `ocr` feature".into(),
        ))
    }
}

// -- Requests ------------------------------------------------------------------

async fn read_source(source: &DocumentSource, filename: Option<String>) -> Result<DocumentRequest> {
    match source {
        DocumentSource::Path(path) => read_request(path, filename).await,
        DocumentSource::Url(url) => {
            let filename = source.filename(filename);
            let bytes = fetch(url, &filename).await?;
            Ok(DocumentRequest::new(bytes, filename))
        }
    }
}

/// Download `url`. Non-success statuses are errors.
async fn fetch(url: &str, filename: &str) -> Result<Vec<u8>> {
    let download_failed = |err: reqwest::Error| LesewerkError::Document {
        filename: filename.to_string(),
        message: format!("download failed: {err}"),
    };

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(download_failed)?;
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(download_failed)?;
    let bytes = response.bytes().await.map_err(download_failed)?;

    debug!(url, bytes = bytes.len(), "Downloaded document");
    Ok(bytes.to_vec())
}

async fn read_request(path: &Path, filename: Option<String>) -> Result<DocumentRequest> {
    let bytes = tokio::fs::read(path).await?;
    Ok(DocumentRequest::new(bytes, request_filename(path, filename)))
}

/// Reported filename: the explicit one, else the path's file name, else a
/// default chosen from the path.
fn request_filename(path: &Path, explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                DocumentRequest::default_filename_for(&path.to_string_lossy()).to_string()
            })
    })
}
