//! Affine pixel-to-native mapping for north-up rasters.

use serde::{Deserialize, Serialize};

use crate::bbox::GeoBBox;
use crate::crs::CrsCode;
use crate::error::{RasterError, RasterResult};

/// Affine mapping from pixel (col, row) to native-CRS coordinates.
///
/// Rotation and shear terms are not representable: `x_res` is strictly
/// positive and `y_res` strictly negative (rows increase southward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Native X of the outer corner of pixel (0, 0).
    pub origin_x: f64,
    /// Native Y of the outer corner of pixel (0, 0).
    pub origin_y: f64,
    /// Pixel width in native units.
    pub x_res: f64,
    /// Pixel height in native units (negative).
    pub y_res: f64,
    /// CRS the native coordinates are expressed in.
    pub crs: CrsCode,
}

impl GeoTransform {
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        x_res: f64,
        y_res: f64,
        crs: CrsCode,
    ) -> RasterResult<Self> {
        if !(origin_x.is_finite() && origin_y.is_finite()) {
            return Err(RasterError::Metadata(format!(
                "non-finite origin ({}, {})",
                origin_x, origin_y
            )));
        }
        if !(x_res.is_finite() && x_res > 0.0) {
            return Err(RasterError::Metadata(format!(
                "x resolution must be positive, got {}",
                x_res
            )));
        }
        if !(y_res.is_finite() && y_res < 0.0) {
            return Err(RasterError::Metadata(format!(
                "y resolution must be negative (north-up), got {}",
                y_res
            )));
        }

        Ok(Self {
            origin_x,
            origin_y,
            x_res,
            y_res,
            crs,
        })
    }

    /// Native coordinates of a (fractional) pixel position.
    pub fn pixel_to_native(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.x_res,
            self.origin_y + row * self.y_res,
        )
    }

    /// Fractional pixel position of a native coordinate.
    pub fn native_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.x_res,
            (y - self.origin_y) / self.y_res,
        )
    }

    /// Native extent of a raster with the given pixel dimensions.
    pub fn bounds(&self, width: usize, height: usize) -> RasterResult<GeoBBox> {
        let (east, south) = self.pixel_to_native(width as f64, height as f64);
        GeoBBox::new(self.origin_x, south, east, self.origin_y, self.crs)
    }
}
