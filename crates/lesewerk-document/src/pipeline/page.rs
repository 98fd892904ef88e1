// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page processor: normalize one page, recognise it, and turn any failure
// into an error marker on that page's result.

use lesewerk_core::error::Result;
use lesewerk_core::types::PageResult;
use tracing::{debug, instrument, warn};

use crate::engine::Engine;
use crate::image::ImageNormalizer;
use crate::raster::PageImage;

/// Processes single pages against a shared engine. Cheap to clone.
#[derive(Clone)]
pub struct PageProcessor {
    normalizer: ImageNormalizer,
    engine: Engine,
}

impl PageProcessor {
    /// The normalizer follows the engine's input channel order.
    pub fn new(engine: Engine, max_dimension: u32) -> Self {
        Self {
            normalizer: ImageNormalizer::new(max_dimension, engine.channel_order()),
            engine,
        }
    }

    /// Never fails: errors end up in [`PageResult::error`] with empty text.
    #[instrument(skip_all, fields(page_number = page.page_number()))]
    pub fn process(&self, page: PageImage) -> PageResult {
        let page_number = page.page_number();
        match self.recognize_page(page) {
            Ok(raw_text) => {
                debug!(chars = raw_text.len(), "Page recognised");
                PageResult::recognized(page_number, raw_text)
            }
            Err(err) => {
                warn!(page_number, error = %err, "OCR failed for page");
                PageResult::failed(page_number, err.to_string())
            }
        }
    }

    fn recognize_page(&self, page: PageImage) -> Result<String> {
        let normalized = self.normalizer.normalize(page)?;
        let lines = self.engine.recognize(&normalized)?;
        Ok(lines.join("\n"))
    }
}
