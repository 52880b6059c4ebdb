//! Gradient rendering of index fields and legend strips.

use rayon::prelude::*;
use raster_common::IndexResult;
use tracing::debug;

use crate::palette::Palette;

/// Rows per rayon task; small fields stay on one thread.
const ROWS_PER_TASK: usize = 64;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Linear color interpolation, rounded to the nearest channel value.
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;

    Color::new(
        mix(color1.r, color2.r),
        mix(color1.g, color2.g),
        mix(color1.b, color2.b),
        mix(color1.a, color2.a),
    )
}

/// An RGBA8 image, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorRaster {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl ColorRaster {
    pub fn pixel(&self, col: usize, row: usize) -> Option<[u8; 4]> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let i = (row * self.width + col) * 4;
        let p = self.pixels.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Encode as an RGBA PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, String> {
        crate::png::create_png(&self.pixels, self.width, self.height)
    }
}

/// Map an index value from [-1, 1] onto [0, 1].
pub fn normalize_index(value: f32) -> f32 {
    ((value + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Render a scalar field, scaling `[min_val, max_val]` onto the palette.
///
/// NaN samples are fully transparent. A degenerate range renders every
/// valid sample with the first stop.
pub fn render_field(
    data: &[f32],
    width: usize,
    height: usize,
    min_val: f32,
    max_val: f32,
    palette: Palette,
) -> ColorRaster {
    let range = max_val - min_val;
    let mut pixels = vec![0u8; width * height * 4];
    if width == 0 {
        return ColorRaster { width, height, pixels };
    }

    pixels
        .par_chunks_mut(width * 4 * ROWS_PER_TASK)
        .enumerate()
        .for_each(|(task, block)| {
            let first = task * ROWS_PER_TASK * width;
            for (i, pixel) in block.chunks_exact_mut(4).enumerate() {
                let Some(&value) = data.get(first + i) else {
                    continue;
                };
                if value.is_nan() {
                    continue;
                }
                let t = if range > 0.0 { (value - min_val) / range } else { 0.0 };
                pixel.copy_from_slice(&palette.color_at(t).to_rgba());
            }
        });

    ColorRaster { width, height, pixels }
}

/// Render an index field; values span [-1, 1] and no-data is transparent.
pub fn render_index(result: &IndexResult, palette: Palette) -> ColorRaster {
    debug!(
        width = result.width,
        height = result.height,
        palette = %palette,
        "Rendering index"
    );
    render_field(&result.values, result.width, result.height, -1.0, 1.0, palette)
}

/// Render a horizontal legend strip sweeping the palette left to right.
///
/// Uses the same lookup as [`render_index`], so legend colors match the
/// rendered field exactly.
pub fn render_legend(palette: Palette, width: usize, height: usize) -> ColorRaster {
    let mut row = Vec::with_capacity(width * 4);
    for col in 0..width {
        let t = if width > 1 {
            col as f32 / (width - 1) as f32
        } else {
            0.0
        };
        row.extend_from_slice(&palette.color_at(t).to_rgba());
    }

    ColorRaster {
        width,
        height,
        pixels: row.repeat(height),
    }
}
