// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: solid-colour pages and scripted backends.
//
// A page's gray level stands in for its content. `ScriptedBackend` maps levels
// to lines of text; `LevelRasterizer` turns every input byte into one page of
// that level, so a request's bytes describe the document it represents.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lesewerk_core::config::PipelineConfig;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::DocumentKind;

use crate::engine::{EngineHandle, RecognitionBackend};
use crate::image::{ChannelOrder, ImageNormalizer, NormalizedImage};
use crate::pipeline::DocumentPipeline;
use crate::raster::{PageImage, PageRaster, Rasterizer, decode_image};

/// Byte that makes `LevelRasterizer` emit an unrenderable page.
pub const UNRENDERABLE: u8 = 1;

/// Leading byte that makes `LevelRasterizer` reject the whole document.
pub const CORRUPT: u8 = b'!';

/// Level tolerance absorbing lossy encodings such as JPEG.
const LEVEL_TOLERANCE: u8 = 4;

pub fn solid_page(level: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([level, level, level])))
}

pub fn png_bytes(level: u8) -> Vec<u8> {
    encode(level, ImageFormat::Png)
}

pub fn jpeg_bytes(level: u8) -> Vec<u8> {
    encode(level, ImageFormat::Jpeg)
}

fn encode(level: u8, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    solid_page(level)
        .write_to(&mut Cursor::new(&mut buffer), format)
        .expect("encoding a solid test page");
    buffer
}

pub fn normalized(level: u8) -> NormalizedImage {
    ImageNormalizer::new(1920, ChannelOrder::Rgb)
        .normalize(PageImage::new(1, PageRaster::Decoded(solid_page(level))))
        .expect("normalizing a solid test page")
}

/// Recognition backend answering from a level → lines script.
#[derive(Default)]
pub struct ScriptedBackend {
    script: HashMap<u8, Vec<String>>,
    failing: Vec<u8>,
    panicking: Vec<u8>,
    delays: HashMap<u8, Duration>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, level: u8, lines: &[&str]) -> Self {
        self.script
            .insert(level, lines.iter().map(|line| line.to_string()).collect());
        self
    }

    pub fn failing_on(mut self, level: u8) -> Self {
        self.failing.push(level);
        self
    }

    pub fn panicking_on(mut self, level: u8) -> Self {
        self.panicking.push(level);
        self
    }

    pub fn delay_on(mut self, level: u8, delay: Duration) -> Self {
        self.delays.insert(level, delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Highest number of overlapping `recognize` calls observed.
    pub fn max_in_flight(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_in_flight)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn matches(level: u8, candidates: impl IntoIterator<Item = u8>) -> Option<u8> {
        candidates
            .into_iter()
            .find(|candidate| candidate.abs_diff(level) <= LEVEL_TOLERANCE)
    }
}

impl RecognitionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let level = image.pixel(0, 0).map(|px| px[0]).unwrap_or_default();
        let delay = Self::matches(level, self.delays.keys().copied())
            .and_then(|key| self.delays.get(&key).copied())
            .unwrap_or(self.default_delay);
        std::thread::sleep(delay);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if Self::matches(level, self.panicking.iter().copied()).is_some() {
            panic!("scripted backend panic on level {level}");
        }
        if Self::matches(level, self.failing.iter().copied()).is_some() {
            return Err(LesewerkError::Recognition(format!(
                "scripted failure on level {level}"
            )));
        }
        Ok(Self::matches(level, self.script.keys().copied())
            .and_then(|key| self.script.get(&key).cloned())
            .unwrap_or_default())
    }
}

/// Rasterizer where each input byte becomes one solid page of that level.
pub struct LevelRasterizer;

impl Rasterizer for LevelRasterizer {
    fn rasterize(&self, bytes: &[u8], kind: DocumentKind) -> Result<Vec<PageImage>> {
        if kind == DocumentKind::Image {
            let image = decode_image(bytes)?;
            return Ok(vec![PageImage::new(1, PageRaster::Decoded(image))]);
        }
        if bytes.first() == Some(&CORRUPT) {
            return Err(LesewerkError::Decode("not a PDF document".into()));
        }
        if bytes.is_empty() {
            return Err(LesewerkError::EmptyDocument);
        }
        let rasters = bytes
            .iter()
            .map(|&level| match level {
                UNRENDERABLE => PageRaster::Unrendered("page stream is corrupt".into()),
                level => PageRaster::Decoded(solid_page(level)),
            })
            .collect();
        Ok(PageImage::number_sequence(rasters))
    }
}

/// Pipeline over `LevelRasterizer` and a ready scripted backend.
pub fn scripted_pipeline(backend: ScriptedBackend, config: PipelineConfig) -> DocumentPipeline {
    let engine = EngineHandle::from_backend(Arc::new(backend), config.serialize_recognition);
    DocumentPipeline::new(Arc::new(LevelRasterizer), Arc::new(engine), config)
}
