//! Point transforms between two EPSG coordinate reference systems.

use proj4rs::proj::Proj;
use raster_common::{CrsCode, RasterError, RasterResult};

/// A reusable transform from one CRS to another.
///
/// Geographic coordinates are taken and returned in degrees; proj4rs works
/// in radians for `longlat` systems so the conversion happens here.
pub struct Projector {
    source: CrsCode,
    target: CrsCode,
    source_proj: Proj,
    target_proj: Proj,
    source_is_geographic: bool,
    target_is_geographic: bool,
}

impl Projector {
    /// Build a projector for the given CRS pair.
    pub fn new(source: CrsCode, target: CrsCode) -> RasterResult<Self> {
        Ok(Self {
            source,
            target,
            source_proj: load_proj(source)?,
            target_proj: load_proj(target)?,
            source_is_geographic: source.is_geographic(),
            target_is_geographic: target.is_geographic(),
        })
    }

    /// Transform a single point.
    pub fn project_point(&self, x: f64, y: f64) -> RasterResult<(f64, f64)> {
        if self.source == self.target {
            return Ok((x, y));
        }

        let mut point = if self.source_is_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(&self.source_proj, &self.target_proj, &mut point).map_err(
            |e| {
                RasterError::Projection(format!(
                    "transform {} -> {} failed for ({}, {}): {:?}",
                    self.source, self.target, x, y, e
                ))
            },
        )?;

        let (out_x, out_y) = if self.target_is_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(RasterError::Projection(format!(
                "transform {} -> {} is undefined at ({}, {})",
                self.source, self.target, x, y
            )));
        }

        Ok((out_x, out_y))
    }
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

fn load_proj(crs: CrsCode) -> RasterResult<Proj> {
    let definition = crs.proj4().ok_or_else(|| {
        RasterError::Projection(format!("{} is not in the EPSG database", crs))
    })?;

    Proj::from_proj_string(definition)
        .map_err(|e| RasterError::Projection(format!("invalid definition for {}: {:?}", crs, e)))
}
