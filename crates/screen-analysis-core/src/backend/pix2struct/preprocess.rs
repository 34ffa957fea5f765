//! Image preprocessing for Pix2Struct.
//!
//! Pix2Struct does not resize to a fixed square. It rescales the image so
//! that as many 16x16 patches as possible fit in `max_patches` while keeping
//! the aspect ratio, then feeds the patches as rows:
//! - Normalization: per-image standardization, `(x - mean) / max(std, 1/sqrt(n))`
//! - Row layout: `[row + 1, col + 1, p(0,0,R), p(0,0,G), p(0,0,B), p(0,1,R), ...]`
//! - Tensor layout: `[1, max_patches, 2 + 16 * 16 * 3]`, zero padded
//! - Attention mask: `[1, max_patches]`, 1 for real patches, 0 for padding

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{Array2, Array3};

/// Patch edge length in pixels.
pub const PATCH_SIZE: usize = 16;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Width of one flattened patch row: row id, col id, then pixel values.
pub const PATCH_DIM: usize = 2 + PATCH_SIZE * PATCH_SIZE * CHANNELS;

/// Encoder inputs for one image.
#[derive(Debug, Clone)]
pub struct FlattenedPatches {
    /// `[1, max_patches, PATCH_DIM]`
    pub patches: Array3<f32>,
    /// `[1, max_patches]`
    pub attention_mask: Array2<i64>,
    /// Patch grid rows actually used
    pub rows: usize,
    /// Patch grid columns actually used
    pub cols: usize,
}

impl FlattenedPatches {
    /// Number of real (non-padding) patches.
    pub fn num_patches(&self) -> usize {
        self.rows * self.cols
    }
}

/// Patch grid `(rows, cols)` for an image of `height x width`.
///
/// Each side gets at least one patch and at most `max_patches`;
/// `rows * cols` never exceeds `max_patches`.
pub fn patch_grid(height: u32, width: u32, max_patches: usize) -> (usize, usize) {
    let patch = PATCH_SIZE as f64;
    let (h, w) = (height.max(1) as f64, width.max(1) as f64);
    let scale = (max_patches as f64 * (patch / h) * (patch / w)).sqrt();

    let rows = ((scale * h / patch).floor() as usize).clamp(1, max_patches.max(1));
    let cols = ((scale * w / patch).floor() as usize).clamp(1, max_patches.max(1));
    (rows, cols)
}

/// Build Pix2Struct encoder inputs from an image.
pub fn extract_flattened_patches(image: &DynamicImage, max_patches: usize) -> FlattenedPatches {
    let rgb = image.to_rgb8();
    let (mean, std) = standardization(rgb.as_raw());

    let (rows, cols) = patch_grid(rgb.height(), rgb.width(), max_patches);
    let resized = image::imageops::resize(
        &rgb,
        (cols * PATCH_SIZE) as u32,
        (rows * PATCH_SIZE) as u32,
        FilterType::Triangle,
    );

    let mut patches = Array3::<f32>::zeros((1, max_patches, PATCH_DIM));
    let mut attention_mask = Array2::<i64>::zeros((1, max_patches));

    let raw = resized.as_raw();
    let row_stride = cols * PATCH_SIZE * CHANNELS;
    for r in 0..rows {
        for c in 0..cols {
            let index = r * cols + c;
            let mut row = patches.slice_mut(ndarray::s![0usize, index, ..]);
            row[0] = (r + 1) as f32;
            row[1] = (c + 1) as f32;

            let mut offset = 2;
            for y in 0..PATCH_SIZE {
                let start = (r * PATCH_SIZE + y) * row_stride + c * PATCH_SIZE * CHANNELS;
                for &value in &raw[start..start + PATCH_SIZE * CHANNELS] {
                    row[offset] = (value as f32 - mean) / std;
                    offset += 1;
                }
            }
            attention_mask[[0, index]] = 1;
        }
    }

    FlattenedPatches {
        patches,
        attention_mask,
        rows,
        cols,
    }
}

/// Mean and floored standard deviation over every channel value.
fn standardization(values: &[u8]) -> (f32, f32) {
    let n = values.len().max(1) as f64;
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    let mean = sum / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = variance.sqrt().max(1.0 / n.sqrt());
    (mean as f32, std as f32)
}
