// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoding of encoded raster images (JPEG, PNG, …) and raw renderer samples.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use lesewerk_core::error::{LesewerkError, Result};
use tracing::{debug, instrument};

use super::PageRaster;

/// Decode encoded image bytes. The format is sniffed from the content, not
/// from the filename.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    let img = image::load_from_memory(data)
        .map_err(|err| LesewerkError::Decode(format!("failed to decode image: {}", err)))?;
    debug!(
        width = img.width(),
        height = img.height(),
        "Image decoded from bytes"
    );
    Ok(img)
}

/// Turn a page raster into a `DynamicImage`.
///
/// Fails with `Decode` for unrendered pages, unsupported channel counts, and
/// sample buffers whose length does not match the declared dimensions.
pub fn raster_to_dynamic(raster: PageRaster) -> Result<DynamicImage> {
    match raster {
        PageRaster::Decoded(image) => Ok(image),
        PageRaster::Unrendered(reason) => Err(LesewerkError::Decode(reason)),
        PageRaster::Pixels {
            width,
            height,
            channels,
            samples,
        } => {
            let len = samples.len();
            let image = match channels {
                1 => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
                3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
                4 => RgbaImage::from_raw(width, height, samples).map(DynamicImage::ImageRgba8),
                other => {
                    return Err(LesewerkError::Decode(format!(
                        "unsupported sample layout: {other} channels"
                    )));
                }
            };
            image.ok_or_else(|| {
                LesewerkError::Decode(format!(
                    "{len} samples do not fill a {width}x{height} page with {channels} channels"
                ))
            })
        }
    }
}
