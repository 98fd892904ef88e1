// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Lesewerk.
//
// Scope of each variant:
//   page:     Decode (during normalization), Recognition
//   document: Decode (during rasterization), EmptyDocument, Document,
//             InvalidRequest, UnsupportedDocument
//   process:  EngineNotReady

use thiserror::Error;

/// Top-level error type for all Lesewerk operations.
#[derive(Debug, Error)]
pub enum LesewerkError {
    // -- Input errors --
    #[error("failed to decode input: {0}")]
    Decode(String),

    #[error("document contains no renderable pages")]
    EmptyDocument,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),

    // -- Engine errors --
    #[error("OCR engine not initialized: {0}")]
    EngineNotReady(String),

    #[error("recognition failed: {0}")]
    Recognition(String),

    // -- Pipeline errors --
    #[error("processing {filename} failed: {message}")]
    Document { filename: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LesewerkError {
    /// True when the error means the whole process is unusable.
    ///
    /// Only a failed engine initialisation qualifies: it is cached for the
    /// lifetime of the process and every later call sees it again.
    pub fn is_process_fatal(&self) -> bool {
        matches!(self, Self::EngineNotReady(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LesewerkError>;
