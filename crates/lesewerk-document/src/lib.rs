// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lesewerk-document: Document-to-text processing for Lesewerk.
//
// Provides rasterization (image decoding, MuPDF page rendering), page
// normalization, the shared recognition engine handle, and the pipeline that
// fans pages out over a bounded worker pool and batches documents.

pub mod engine;
pub mod image;
pub mod pipeline;
pub mod raster;
pub mod scan;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the primary structs so callers can use `lesewerk_document::DocumentPipeline` etc.
pub use engine::{Engine, EngineHandle, RecognitionBackend};
pub use self::image::{ChannelOrder, ImageNormalizer, NormalizedImage};
pub use pipeline::{BatchOrchestrator, DocumentPipeline, PageProcessor};
pub use raster::{DocumentRasterizer, PageImage, PageRaster, PageRenderer, Rasterizer};

#[cfg(feature = "pdf")]
pub use raster::MupdfRenderer;

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrsBackend;
