//! Pixel-budget normalization applied before any backend call.
//!
//! Vision backends get slow (or refuse) on full-resolution screenshots, so
//! every image is brought under a fixed pixel ceiling while keeping its
//! aspect ratio.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Default pixel ceiling (1.8 megapixels).
pub const DEFAULT_MAX_PIXELS: u64 = 1_800_000;

/// Downscales images that exceed a pixel budget.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    max_pixels: u64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PIXELS)
    }
}

impl Normalizer {
    /// Create a normalizer with the given pixel ceiling.
    pub fn new(max_pixels: u64) -> Self {
        Self {
            max_pixels: max_pixels.max(1),
        }
    }

    /// The configured pixel ceiling.
    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    /// Target dimensions for an image of `width x height`.
    ///
    /// Returns the input unchanged when it already fits. Otherwise scales
    /// both sides by `sqrt(max_pixels / pixels)`, truncating, and never
    /// returns a zero side.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let pixels = width as u64 * height as u64;
        if pixels <= self.max_pixels {
            return (width, height);
        }

        let scale = (self.max_pixels as f64 / pixels as f64).sqrt();
        let mut new_width = ((width as f64 * scale) as u32).max(1);
        let mut new_height = ((height as f64 * scale) as u32).max(1);

        // Floating point can land a hair over the budget; trim the longer side.
        while new_width as u64 * new_height as u64 > self.max_pixels {
            if new_width >= new_height && new_width > 1 {
                new_width -= 1;
            } else if new_height > 1 {
                new_height -= 1;
            } else {
                break;
            }
        }

        (new_width, new_height)
    }

    /// Bring an image under the pixel budget.
    ///
    /// Images already within budget are returned as-is, without a copy.
    pub fn normalize(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = image.dimensions();
        let (new_width, new_height) = self.target_dimensions(width, height);
        if (new_width, new_height) == (width, height) {
            return image;
        }

        tracing::info!(
            "Resize image from {}x{} to {}x{}",
            width,
            height,
            new_width,
            new_height
        );
        image.resize_exact(new_width, new_height, FilterType::Lanczos3)
    }
}
