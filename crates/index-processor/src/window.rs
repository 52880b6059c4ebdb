//! Mapping native-CRS extents onto bounds-clamped pixel windows.

use raster_common::{
    GeoBBox, GeoTransform, PixelWindow, RasterError, RasterResult, WindowMapping, WindowPlan,
};
use tracing::debug;

/// Map a native-CRS box onto a pixel window of a `full_width x full_height`
/// raster and pick an output size no larger than `max_dim` on either side.
///
/// The north edge maps to the smallest row. A box that does not overlap the
/// raster yields [`WindowMapping::EmptyIntersection`].
pub fn map_window(
    transform: &GeoTransform,
    native: &GeoBBox,
    full_width: usize,
    full_height: usize,
    max_dim: usize,
) -> RasterResult<WindowMapping> {
    if native.crs != transform.crs {
        return Err(RasterError::InvalidInput(format!(
            "bbox is in {} but the raster is in {}",
            native.crs, transform.crs
        )));
    }
    if max_dim == 0 {
        return Err(RasterError::InvalidInput("max output dimension is 0".to_string()));
    }

    let col0 = ((native.west - transform.origin_x) / transform.x_res).floor();
    let row0 = ((native.north - transform.origin_y) / transform.y_res).floor();
    let col1 = ((native.east - transform.origin_x) / transform.x_res).ceil();
    let row1 = ((native.south - transform.origin_y) / transform.y_res).ceil();

    let window = PixelWindow::new(
        clamp_index(col0, full_width),
        clamp_index(row0, full_height),
        clamp_index(col1, full_width),
        clamp_index(row1, full_height),
    );

    if window.is_empty() {
        debug!(col0, row0, col1, row1, "AOI does not intersect raster");
        return Ok(WindowMapping::EmptyIntersection);
    }

    let (out_width, out_height) = output_size(window.width(), window.height(), max_dim);
    Ok(WindowMapping::Window(WindowPlan {
        window,
        out_width,
        out_height,
    }))
}

/// Output size for a window: scaled down so the larger side is at most
/// `max_dim`, never upsampled, at least 1 on each side.
pub fn output_size(width: usize, height: usize, max_dim: usize) -> (usize, usize) {
    let longest = width.max(height).max(1) as f64;
    let scale = (max_dim as f64 / longest).min(1.0);
    let out = |n: usize| ((n as f64 * scale).round() as usize).max(1);
    (out(width), out(height))
}

fn clamp_index(value: f64, max: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= max as f64 {
        max
    } else {
        value as usize
    }
}
