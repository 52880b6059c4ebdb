//! Reprojection of areas of interest into a raster's native CRS.

use raster_common::{CrsCode, GeoBBox, RasterError, RasterResult};
use tracing::debug;

use crate::transform::Projector;

/// Reproject a bounding box into `target`.
///
/// Between two geographic systems the box is returned unchanged (relabelled
/// to `target`).
/// Otherwise all four corners are projected and the axis-aligned bound of
/// the results is returned, which may be a superset of the true footprint.
pub fn reproject_bbox(bbox: &GeoBBox, target: CrsCode) -> RasterResult<GeoBBox> {
    if bbox.crs == target || (bbox.crs.is_geographic() && target.is_geographic()) {
        return Ok(bbox.with_crs(target));
    }

    let projector = Projector::new(bbox.crs, target)?;
    let projected = bbox
        .corners()
        .iter()
        .map(|&(x, y)| projector.project_point(x, y))
        .collect::<RasterResult<Vec<_>>>()?;

    let native = GeoBBox::from_points(projected.iter().copied(), target).ok_or_else(|| {
        RasterError::Projection(format!(
            "{} -> {} collapsed bbox [{}, {}, {}, {}]",
            bbox.crs, target, bbox.west, bbox.south, bbox.east, bbox.north
        ))
    })?;

    debug!(
        from = %bbox.crs,
        to = %target,
        west = native.west,
        south = native.south,
        east = native.east,
        north = native.north,
        "Reprojected AOI"
    );

    Ok(native)
}
