// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LesewerkError, Result};

/// Lowest and highest rasterization resolution accepted for paginated documents.
pub const MIN_RENDER_DPI: u32 = 36;
pub const MAX_RENDER_DPI: u32 = 600;

/// What the pipeline does with a paginated document that renders to zero pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyDocumentPolicy {
    /// Return `total_pages = 0, pages = []` as a successful result.
    #[default]
    Accept,
    /// Treat the document as failed.
    Reject,
}

/// Recognition backend options.
///
/// The pipeline passes these through untouched; a backend that cannot honour
/// an option reports it when it is initialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Recognition language / script set.
    pub language: String,
    /// Detect and correct rotated text lines (extra cost per line).
    pub orientation_classification: bool,
    /// Use an accelerator when the backend has one.
    pub accelerator_enabled: bool,
    /// Pixel probability threshold for text detection.
    pub detection_threshold: f32,
    /// Minimum box score kept after detection.
    pub box_threshold: f32,
    /// Directory holding model files. `None` uses the backend's default cache.
    pub model_dir: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            orientation_classification: false,
            accelerator_enabled: true,
            detection_threshold: 0.3,
            box_threshold: 0.6,
            model_dir: None,
        }
    }
}

/// Settings for the document-to-text pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rasterization resolution for paginated documents.
    pub render_dpi: u32,
    /// Longest side, in pixels, a page may have before it is downscaled.
    pub max_dimension: u32,
    /// Upper bound on pages processed at the same time within one document.
    pub page_workers: usize,
    /// Upper bound on documents processed at the same time within one batch.
    pub batch_concurrency: usize,
    /// Route every recognition call through a single lock.
    pub serialize_recognition: bool,
    /// Handling of documents with zero pages.
    pub empty_document_policy: EmptyDocumentPolicy,
    /// Reject filenames whose extension is not a known document or image type.
    pub strict_extensions: bool,
    /// Options handed to the recognition backend.
    pub engine: EngineOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            render_dpi: 150,
            max_dimension: 1920,
            page_workers: 4,
            batch_concurrency: 1,
            serialize_recognition: false,
            empty_document_policy: EmptyDocumentPolicy::Accept,
            strict_extensions: false,
            engine: EngineOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolution actually used for rendering, clamped to the supported range.
    pub fn effective_dpi(&self) -> u32 {
        self.render_dpi.clamp(MIN_RENDER_DPI, MAX_RENDER_DPI)
    }

    /// Check that every bound is usable.
    pub fn validate(&self) -> Result<()> {
        if self.page_workers == 0 {
            return Err(LesewerkError::Config("page_workers must be at least 1".into()));
        }
        if self.batch_concurrency == 0 {
            return Err(LesewerkError::Config(
                "batch_concurrency must be at least 1".into(),
            ));
        }
        if self.max_dimension == 0 {
            return Err(LesewerkError::Config("max_dimension must be at least 1".into()));
        }
        for (name, value) in [
            ("detection_threshold", self.engine.detection_threshold),
            ("box_threshold", self.engine.box_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LesewerkError::Config(format!(
                    "{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }
        Ok(())
    }
}
