// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page normalizer: caps page size and converts pixels into the layout the
// recognition backend reads: three interleaved 8-bit channels, no alpha, in
// the backend's channel order. Transparent pixels are composited onto white.

use image::DynamicImage;
use image::imageops::FilterType;
use lesewerk_core::error::Result;
use tracing::{debug, instrument};

use crate::raster::PageImage;
use crate::raster::decode::raster_to_dynamic;

/// Order of the three colour channels in a normalized buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// A page ready for recognition: `width * height * 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    /// Interleaved pixel bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Channel values of the pixel at (`x`, `y`), in buffer order.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.data.get(offset..offset + 3)?;
        Some([px[0], px[1], px[2]])
    }
}

/// Prepares page images for a specific recognition backend.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_dimension: u32,
    order: ChannelOrder,
}

impl ImageNormalizer {
    pub fn new(max_dimension: u32, order: ChannelOrder) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            order,
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Downscale if needed, drop alpha, and reorder channels.
    ///
    /// Fails with `Decode` only when the page's pixel data is unusable.
    #[instrument(skip_all, fields(page_number = page.page_number()))]
    pub fn normalize(&self, page: PageImage) -> Result<NormalizedImage> {
        let image = raster_to_dynamic(page.into_raster())?;
        let image = self.downscale(image);

        let mut data = flatten_onto_white(&image);
        if self.order == ChannelOrder::Bgr {
            for px in data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
        }

        Ok(NormalizedImage {
            width: image.width(),
            height: image.height(),
            order: self.order,
            data,
        })
    }

    /// Shrink so the longer side equals `max_dimension`, preserving aspect
    /// ratio.
    fn downscale(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = (image.width(), image.height());
        let Some((new_w, new_h)) = fit_within(width, height, self.max_dimension) else {
            return image;
        };
        debug!(
            from_w = width,
            from_h = height,
            new_w,
            new_h,
            "Downscaling page"
        );
        image.resize_exact(new_w, new_h, FilterType::Lanczos3)
    }
}

/// Interleaved RGB bytes, with any alpha channel blended onto a white
/// background.
fn flatten_onto_white(image: &DynamicImage) -> Vec<u8> {
    if !image.color().has_alpha() {
        return image.to_rgb8().into_raw();
    }
    let rgba = image.to_rgba8();
    let mut data = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
    for px in rgba.pixels() {
        let [r, g, b, a] = px.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
            data.push(blended as u8);
        }
    }
    data
}

/// Target size for an image whose longer side exceeds `max_dimension`, or
/// `None` when it already fits.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dimension {
        return None;
    }
    let scale = max_dimension as f64 / longest as f64;
    let scaled = |side: u32| -> u32 {
        if side == longest {
            max_dimension
        } else {
            ((side as f64 * scale).round() as u32).max(1)
        }
    };
    Some((scaled(width), scaled(height)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PageRaster;
    use image::{Rgba, RgbaImage};

    fn page(image: DynamicImage) -> PageImage {
        PageImage::new(1, PageRaster::Decoded(image))
    }

    #[test]
    fn landscape_page_downscaled_to_max() {
        let normalizer = ImageNormalizer::new(1920, ChannelOrder::Rgb);
        let out = normalizer
            .normalize(page(DynamicImage::new_rgb8(4000, 3000)))
            .unwrap();
        assert_eq!((out.width(), out.height()), (1920, 1440));
        assert_eq!(out.as_bytes().len(), 1920 * 1440 * 3);
    }

    #[test]
    fn portrait_page_downscaled_on_height() {
        assert_eq!(fit_within(1000, 3000, 1500), Some((500, 1500)));
    }

    #[test]
    fn small_page_untouched() {
        assert_eq!(fit_within(800, 600, 1920), None);
        assert_eq!(fit_within(1920, 1920, 1920), None);

        let normalizer = ImageNormalizer::new(1920, ChannelOrder::Rgb);
        let out = normalizer
            .normalize(page(DynamicImage::new_rgb8(800, 600)))
            .unwrap();
        assert_eq!((out.width(), out.height()), (800, 600));
    }

    #[test]
    fn extreme_aspect_ratio_keeps_one_pixel() {
        assert_eq!(fit_within(10_000, 2, 100), Some((100, 1)));
    }

    #[test]
    fn alpha_is_blended_onto_white() {
        let mut rgba = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 1, Rgba([0, 0, 0, 255]));
        rgba.put_pixel(2, 2, Rgba([0, 0, 0, 128]));
        rgba.put_pixel(3, 3, Rgba([10, 20, 30, 255]));
        let normalizer = ImageNormalizer::new(1920, ChannelOrder::Rgb);
        let out = normalizer
            .normalize(page(DynamicImage::ImageRgba8(rgba)))
            .unwrap();
        assert_eq!(out.as_bytes().len(), 4 * 4 * 3);
        // Black text on a transparent background stays readable.
        assert_eq!(out.pixel(0, 0), Some([255, 255, 255]));
        assert_eq!(out.pixel(1, 1), Some([0, 0, 0]));
        assert_eq!(out.pixel(2, 2), Some([127, 127, 127]));
        assert_eq!(out.pixel(3, 3), Some([10, 20, 30]));
    }

    #[test]
    fn bgr_order_swaps_red_and_blue() {
        let rgba = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 50, 255]));
        let normalizer = ImageNormalizer::new(1920, ChannelOrder::Bgr);
        let out = normalizer
            .normalize(page(DynamicImage::ImageRgba8(rgba)))
            .unwrap();
        assert_eq!(out.channel_order(), ChannelOrder::Bgr);
        assert_eq!(out.pixel(1, 1), Some([50, 100, 200]));
    }

    #[test]
    fn gray_pixels_expand_to_three_channels() {
        let raster = PageRaster::Pixels {
            width: 3,
            height: 1,
            channels: 1,
            samples: vec![0, 128, 255],
        };
        let normalizer = ImageNormalizer::new(1920, ChannelOrder::Rgb);
        let out = normalizer.normalize(PageImage::new(1, raster)).unwrap();
        assert_eq!(out.pixel(1, 0), Some([128, 128, 128]));
    }

    #[test]
    fn unrendered_page_fails() {
        let normalizer = ImageNormalizer::new(1920, ChannelOrder::Rgb);
        let result =
            normalizer.normalize(PageImage::new(2, PageRaster::Unrendered("corrupt".into())));
        assert!(result.is_err());
    }
}
