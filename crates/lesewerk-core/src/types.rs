// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Lesewerk OCR pipeline.
//
// The serialized shape of `DocumentResult` and `BatchResult` is a stable
// contract shared with every transport in front of the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{LesewerkError, Result};

/// Extensions decoded directly as a single raster image.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions accepted when strict extension checking is enabled.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// How a document's bytes are turned into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// A single raster image; always exactly one page.
    Image,
    /// A paginated document (PDF) rendered page by page.
    Paginated,
}

impl DocumentKind {
    /// Infer the kind from a filename's extension.
    ///
    /// Anything that is not a known image extension, including names without
    /// an extension, is treated as a paginated document.
    pub fn from_filename(filename: &str) -> Self {
        match extension_of(filename) {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            _ => Self::Paginated,
        }
    }
}

/// Lower-cased extension of `filename`, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// One document submitted for text extraction.
///
/// The kind is decided once, at construction, and never re-derived.
#[derive(Debug, Clone)]
pub struct DocumentRequest {
    bytes: Vec<u8>,
    filename: String,
    kind: DocumentKind,
}

impl DocumentRequest {
    /// Build a request, inferring the kind from `filename`.
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let kind = DocumentKind::from_filename(&filename);
        Self {
            bytes,
            filename,
            kind,
        }
    }

    /// Build a request whose kind is already known.
    pub fn with_kind(bytes: Vec<u8>, filename: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            kind,
        }
    }

    /// Filename to use when the caller supplied none: `receipt.jpg` for
    /// sources that look like images, `document.pdf` otherwise.
    pub fn default_filename_for(source: &str) -> &'static str {
        let lower = source.to_ascii_lowercase();
        if IMAGE_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(&format!(".{ext}")))
        {
            "receipt.jpg"
        } else {
            "document.pdf"
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Reject requests that cannot be processed at all.
    ///
    /// An empty filename is always invalid. With `strict_extensions`, so is
    /// any extension outside [`SUPPORTED_EXTENSIONS`].
    pub fn validate(&self, strict_extensions: bool) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(LesewerkError::InvalidRequest("Invalid file".into()));
        }
        if strict_extensions {
            let supported = extension_of(&self.filename)
                .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()));
            if !supported {
                return Err(LesewerkError::UnsupportedDocument(format!(
                    "Invalid file: {}",
                    self.filename
                )));
            }
        }
        Ok(())
    }

    /// Consume the request, yielding its bytes, filename and kind.
    pub fn into_parts(self) -> (Vec<u8>, String, DocumentKind) {
        (self.bytes, self.filename, self.kind)
    }
}

/// Text recognised on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based position in the rasterized page sequence.
    pub page_number: u32,
    /// Recognised lines joined with `\n`. Empty when nothing was found or
    /// when the page failed.
    pub raw_text: String,
    /// Why the page produced no usable text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    pub fn recognized(page_number: u32, raw_text: impl Into<String>) -> Self {
        Self {
            page_number,
            raw_text: raw_text.into(),
            error: None,
        }
    }

    pub fn failed(page_number: u32, error: impl Into<String>) -> Self {
        Self {
            page_number,
            raw_text: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Text extracted from one document, page by page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub filename: String,
    /// Number of pages produced by rasterization, failed pages included.
    pub total_pages: usize,
    /// One entry per page, ascending by `page_number`, no gaps.
    pub pages: Vec<PageResult>,
}

impl DocumentResult {
    /// A successful result for a document with no pages.
    pub fn empty(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            total_pages: 0,
            pages: Vec::new(),
        }
    }

    /// Number of pages that carry an error marker.
    pub fn failed_page_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_error()).count()
    }
}

/// A document that could not be processed at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub filename: String,
    pub error: String,
}

/// One entry of a batch, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Document(DocumentResult),
    Failed(DocumentFailure),
}

impl BatchEntry {
    pub fn filename(&self) -> &str {
        match self {
            Self::Document(result) => &result.filename,
            Self::Failed(failure) => &failure.filename,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Results for a batch of documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<BatchEntry>,
}

/// Lifecycle state of the shared recognition engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// No caller has needed the engine yet.
    Uninitialized,
    Ready,
    /// Initialisation failed; permanent for this process.
    Failed(String),
}

impl EngineStatus {
    /// Short label used in health reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "NOT_INITIALIZED",
            Self::Ready => "OK",
            Self::Failed(_) => "FAILED",
        }
    }
}

/// Accelerator usage requested vs. actually available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorReport {
    pub requested: bool,
    pub available: bool,
}

/// Health report printed by the status command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub ocr_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<String>,
    pub accelerator: AcceleratorReport,
}

impl HealthReport {
    pub fn new(engine: &EngineStatus, accelerator: AcceleratorReport) -> Self {
        let ocr_error = match engine {
            EngineStatus::Failed(message) => Some(message.clone()),
            _ => None,
        };
        Self {
            status: "OK".to_string(),
            ocr_status: engine.label().to_string(),
            ocr_error,
            accelerator,
        }
    }
}
