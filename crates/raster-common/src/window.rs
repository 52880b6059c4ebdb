//! Pixel windows and the band samples read from them.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};

/// Half-open integer pixel rectangle `[col0, col1) x [row0, row1)`.
///
/// An empty window (`col1 <= col0` or `row1 <= row0`) is representable and
/// means "no overlap"; it is never an error by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col0: usize,
    pub row0: usize,
    pub col1: usize,
    pub row1: usize,
}

impl PixelWindow {
    pub fn new(col0: usize, row0: usize, col1: usize, row1: usize) -> Self {
        Self {
            col0,
            row0,
            col1,
            row1,
        }
    }

    pub fn width(&self) -> usize {
        self.col1.saturating_sub(self.col0)
    }

    pub fn height(&self) -> usize {
        self.row1.saturating_sub(self.row0)
    }

    pub fn is_empty(&self) -> bool {
        self.col1 <= self.col0 || self.row1 <= self.row0
    }

    /// Whether the window lies inside a raster of the given size.
    pub fn fits_within(&self, full_width: usize, full_height: usize) -> bool {
        self.col1 <= full_width && self.row1 <= full_height
    }
}

/// A non-empty pixel window together with the output size to read it at.
///
/// Only produced by the window mapper, so holding one implies there is
/// something to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlan {
    pub window: PixelWindow,
    pub out_width: usize,
    pub out_height: usize,
}

/// Outcome of mapping an AOI onto a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMapping {
    /// The AOI overlaps the raster.
    Window(WindowPlan),
    /// The AOI lies outside the raster extent.
    EmptyIntersection,
}

impl WindowMapping {
    pub fn plan(&self) -> Option<&WindowPlan> {
        match self {
            WindowMapping::Window(plan) => Some(plan),
            WindowMapping::EmptyIntersection => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, WindowMapping::EmptyIntersection)
    }
}

/// One band's sampled pixel window (row-major raw sample values).
#[derive(Debug, Clone, PartialEq)]
pub struct BandWindow {
    pub samples: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// Raw value marking missing pixels, if the source declares one.
    pub nodata: Option<f32>,
}

impl BandWindow {
    pub fn new(
        samples: Vec<f32>,
        width: usize,
        height: usize,
        nodata: Option<f32>,
    ) -> RasterResult<Self> {
        if samples.len() != width * height {
            return Err(RasterError::InvalidInput(format!(
                "band window has {} samples, expected {}x{}",
                samples.len(),
                width,
                height
            )));
        }

        Ok(Self {
            samples,
            width,
            height,
            nodata,
        })
    }

    /// Get the sample at a window coordinate.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.samples.get(row * self.width + col).copied()
    }

    /// Whether a raw sample is the declared no-data value (or NaN).
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata.map_or(false, |nd| value == nd)
    }
}
