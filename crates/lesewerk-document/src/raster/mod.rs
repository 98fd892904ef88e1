// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterization: turns document bytes into an ordered sequence of page images.
//
// Images decode to exactly one page. Paginated documents are handed to a
// `PageRenderer` (MuPDF when the `pdf` feature is enabled) which renders every
// page at the configured resolution. Rendering happens from memory, so no
// staging file is ever written.

pub mod decode;

#[cfg(feature = "pdf")]
pub mod pdf;

use std::sync::Arc;

use image::DynamicImage;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::DocumentKind;
use tracing::{debug, info, instrument};

pub use decode::decode_image;

#[cfg(feature = "pdf")]
pub use pdf::MupdfRenderer;

/// Pixel data for one page, as produced by a rasterizer.
#[derive(Debug, Clone)]
pub enum PageRaster {
    /// An image already decoded by the `image` crate.
    Decoded(DynamicImage),
    /// Raw interleaved samples straight from a renderer.
    Pixels {
        width: u32,
        height: u32,
        /// Samples per pixel: 1 (gray), 3 (RGB) or 4 (RGBA).
        channels: u8,
        samples: Vec<u8>,
    },
    /// The page exists but could not be rendered.
    Unrendered(String),
}

/// One rasterized page and its 1-based position in the document.
#[derive(Debug, Clone)]
pub struct PageImage {
    page_number: u32,
    raster: PageRaster,
}

impl PageImage {
    pub fn new(page_number: u32, raster: PageRaster) -> Self {
        Self {
            page_number,
            raster,
        }
    }

    /// Number rasters 1, 2, 3… in the order given.
    pub fn number_sequence(rasters: Vec<PageRaster>) -> Vec<Self> {
        rasters
            .into_iter()
            .zip(1u32..)
            .map(|(raster, page_number)| Self::new(page_number, raster))
            .collect()
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn raster(&self) -> &PageRaster {
        &self.raster
    }

    pub fn into_raster(self) -> PageRaster {
        self.raster
    }
}

/// Renders every page of a paginated document.
pub trait PageRenderer: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Render all pages, in document order, at `dpi`.
    ///
    /// A page that fails to render must still occupy its position as
    /// [`PageRaster::Unrendered`]; only a document that cannot be opened at
    /// all is an error.
    fn render(&self, bytes: &[u8], dpi: u32) -> Result<Vec<PageImage>>;
}

/// Converts a document into page images.
pub trait Rasterizer: Send + Sync {
    /// Fails with `Decode` for unparseable input and `EmptyDocument` when a
    /// paginated document has no pages.
    fn rasterize(&self, bytes: &[u8], kind: DocumentKind) -> Result<Vec<PageImage>>;
}

/// The standard rasterizer: image decoding plus an optional page renderer.
#[derive(Clone)]
pub struct DocumentRasterizer {
    renderer: Option<Arc<dyn PageRenderer>>,
    dpi: u32,
}

impl DocumentRasterizer {
    /// A rasterizer that handles images only.
    pub fn images_only() -> Self {
        Self {
            renderer: None,
            dpi: 0,
        }
    }

    /// A rasterizer rendering paginated documents through `renderer` at `dpi`.
    pub fn with_renderer(renderer: Arc<dyn PageRenderer>, dpi: u32) -> Self {
        Self {
            renderer: Some(renderer),
            dpi,
        }
    }

    /// The rasterizer for the backends compiled into this build.
    pub fn with_default_backend(dpi: u32) -> Self {
        #[cfg(feature = "pdf")]
        {
            Self::with_renderer(Arc::new(MupdfRenderer::new()), dpi)
        }
        #[cfg(not(feature = "pdf"))]
        {
            let _ = dpi;
            Self::images_only()
        }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl Rasterizer for DocumentRasterizer {
    #[instrument(skip_all, fields(bytes_len = bytes.len(), kind = ?kind))]
    fn rasterize(&self, bytes: &[u8], kind: DocumentKind) -> Result<Vec<PageImage>> {
        match kind {
            DocumentKind::Image => {
                let image = decode_image(bytes)?;
                debug!(width = image.width(), height = image.height(), "Image page decoded");
                Ok(vec![PageImage::new(1, PageRaster::Decoded(image))])
            }
            DocumentKind::Paginated => {
                let renderer = self.renderer.as_ref().ok_or_else(|| {
                    LesewerkError::UnsupportedDocument(
                        "paginated documents need a build with PDF rendering enabled".into(),
                    )
                })?;
                let pages = renderer.render(bytes, self.dpi)?;
                if pages.is_empty() {
                    return Err(LesewerkError::EmptyDocument);
                }
                info!(
                    renderer = renderer.name(),
                    dpi = self.dpi,
                    pages = pages.len(),
                    "Document rasterized"
                );
                Ok(pages)
            }
        }
    }
}
