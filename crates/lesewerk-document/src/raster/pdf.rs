// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// MuPDF page renderer.
//
// The document is opened from memory and every page rendered to an RGB pixmap
// scaled from PDF points (72 per inch) to the requested DPI. MuPDF documents
// are not thread-safe; each call opens its own document and keeps it on the
// calling thread.

use lesewerk_core::error::{LesewerkError, Result};
use mupdf::{Colorspace, Document, Matrix, Pixmap};
use tracing::{debug, instrument, warn};

use super::{PageImage, PageRaster, PageRenderer};

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages with MuPDF.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfRenderer;

impl MupdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRenderer for MupdfRenderer {
    fn name(&self) -> &'static str {
        "mupdf"
    }

    #[instrument(skip_all, fields(bytes_len = bytes.len(), dpi = dpi))]
    fn render(&self, bytes: &[u8], dpi: u32) -> Result<Vec<PageImage>> {
        let document = Document::from_bytes(bytes, "application/pdf")
            .map_err(|err| LesewerkError::Decode(format!("failed to open PDF: {}", err)))?;
        let page_count = document
            .page_count()
            .map_err(|err| LesewerkError::Decode(format!("failed to count PDF pages: {}", err)))?;
        debug!(page_count, "PDF opened");

        let scale = dpi as f32 / POINTS_PER_INCH;
        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();

        let rasters = (0..page_count)
            .map(|index| match render_page(&document, index, &matrix, &colorspace) {
                Ok(raster) => raster,
                Err(err) => {
                    warn!(page_number = index + 1, error = %err, "Page could not be rendered");
                    PageRaster::Unrendered(format!(
                        "page {} could not be rendered: {}",
                        index + 1,
                        err
                    ))
                }
            })
            .collect();

        Ok(PageImage::number_sequence(rasters))
    }
}

fn render_page(
    document: &Document,
    index: i32,
    matrix: &Matrix,
    colorspace: &Colorspace,
) -> std::result::Result<PageRaster, mupdf::Error> {
    let page = document.load_page(index)?;
    let pixmap = page.to_pixmap(matrix, colorspace, false, true)?;
    Ok(pixmap_to_raster(&pixmap))
}

fn pixmap_to_raster(pixmap: &Pixmap) -> PageRaster {
    pack_rows(
        pixmap.samples(),
        pixmap.width() as usize,
        pixmap.height() as usize,
        pixmap.n() as usize,
    )
}

/// Copy samples row by row, dropping any row padding.
fn pack_rows(samples: &[u8], width: usize, height: usize, channels: usize) -> PageRaster {
    if width == 0 || height == 0 {
        return PageRaster::Unrendered("page rendered to an empty pixmap".into());
    }

    let row_len = width * channels;
    let stride = samples.len() / height;
    if stride < row_len {
        return PageRaster::Unrendered(format!(
            "pixmap stride {stride} shorter than row length {row_len}"
        ));
    }

    let mut packed = Vec::with_capacity(row_len * height);
    for row in samples.chunks(stride).take(height) {
        packed.extend_from_slice(&row[..row_len]);
    }

    PageRaster::Pixels {
        width: width as u32,
        height: height as u32,
        channels: channels as u8,
        samples: packed,
    }
}
