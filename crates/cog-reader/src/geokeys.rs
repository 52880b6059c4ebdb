//! GeoTIFF georeferencing: model tags and the GeoKey directory.

use std::collections::HashMap;

use raster_common::{CrsCode, GeoTransform, RasterError, RasterResult};
use tracing::warn;

use crate::source::MetadataWarning;
use crate::tiff::{tags, TagSet};

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Short-valued keys of a GeoKeyDirectoryTag.
///
/// Keys stored in the double or ASCII parameter tags are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoKeyDirectory {
    keys: HashMap<u16, u16>,
}

impl GeoKeyDirectory {
    pub fn parse(shorts: &[u64]) -> RasterResult<Self> {
        if shorts.len() < 4 {
            return Err(RasterError::Metadata(format!(
                "GeoKey directory too short ({} values)",
                shorts.len()
            )));
        }

        let count = shorts[3];
        let available = (shorts.len() - 4) / 4;
        if count > available as u64 {
            return Err(RasterError::Metadata(format!(
                "GeoKey directory declares {} keys but holds {}",
                count, available
            )));
        }

        let mut keys = HashMap::with_capacity(count as usize);
        for entry in shorts[4..].chunks_exact(4).take(count as usize) {
            // Location 0 means the value is stored inline
            if entry[1] == 0 {
                keys.insert(entry[0] as u16, entry[3] as u16);
            }
        }

        Ok(Self { keys })
    }

    pub fn get(&self, key: u16) -> Option<u16> {
        self.keys.get(&key).copied()
    }

    fn pixel_is_point(&self) -> bool {
        self.get(GT_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT)
    }
}

/// Pick the EPSG code from the GeoKeys, or substitute `fallback`.
pub fn resolve_crs(
    keys: Option<&GeoKeyDirectory>,
    fallback: CrsCode,
) -> (CrsCode, Option<MetadataWarning>) {
    let reason = match keys {
        None => "no GeoKey directory",
        Some(keys) => {
            let order = if keys.get(GT_MODEL_TYPE) == Some(MODEL_TYPE_GEOGRAPHIC) {
                [GEOGRAPHIC_TYPE, PROJECTED_CS_TYPE]
            } else {
                [PROJECTED_CS_TYPE, GEOGRAPHIC_TYPE]
            };
            if let Some(code) = order
                .iter()
                .filter_map(|key| keys.get(*key))
                .find(|code| *code > 0 && *code < USER_DEFINED)
            {
                return (CrsCode(code as u32), None);
            }

            if order.iter().any(|key| keys.get(*key) == Some(USER_DEFINED)) {
                "user-defined CRS"
            } else {
                "no EPSG code in GeoKeys"
            }
        }
    };

    warn!(
        fallback = %fallback,
        reason,
        "CRS not found in GeoTIFF keys, assuming fallback; reprojection may be approximate"
    );
    (
        fallback,
        Some(MetadataWarning::CrsFallback {
            assumed: fallback,
            reason: reason.to_string(),
        }),
    )
}

/// Decode the geotransform of the full-resolution image.
pub fn decode_georeferencing(
    directory: &TagSet,
    fallback_crs: CrsCode,
) -> RasterResult<(GeoTransform, Vec<MetadataWarning>)> {
    let keys = directory
        .u64s(tags::GEO_KEY_DIRECTORY)
        .map(|shorts| GeoKeyDirectory::parse(&shorts))
        .transpose()?;
    let (crs, warning) = resolve_crs(keys.as_ref(), fallback_crs);

    let (mut origin_x, mut origin_y, x_res, y_res) = affine_terms(directory)?;

    // PixelIsPoint tiepoints refer to pixel centres
    if keys.as_ref().map_or(false, GeoKeyDirectory::pixel_is_point) {
        origin_x -= x_res / 2.0;
        origin_y -= y_res / 2.0;
    }

    let transform = GeoTransform::new(origin_x, origin_y, x_res, y_res, crs)?;
    Ok((transform, warning.into_iter().collect()))
}

/// `(origin_x, origin_y, x_res, y_res)` from the model tags.
fn affine_terms(directory: &TagSet) -> RasterResult<(f64, f64, f64, f64)> {
    let scale = directory.f64s(tags::MODEL_PIXEL_SCALE);
    let tiepoint = directory.f64s(tags::MODEL_TIEPOINT);

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err(RasterError::Metadata(format!(
                "malformed pixel scale ({} values) or tiepoint ({} values)",
                scale.len(),
                tiepoint.len()
            )));
        }
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        let (sx, sy) = (scale[0], scale[1]);
        return Ok((x - i * sx, y + j * sy, sx, -sy));
    }

    if let Some(m) = directory.f64s(tags::MODEL_TRANSFORMATION) {
        if m.len() < 16 {
            return Err(RasterError::Metadata(format!(
                "model transformation has {} values, expected 16",
                m.len()
            )));
        }
        if m[1] != 0.0 || m[4] != 0.0 {
            return Err(RasterError::Metadata(format!(
                "rotated geotransforms are not supported (terms {}, {})",
                m[1], m[4]
            )));
        }
        return Ok((m[3], m[7], m[0], m[5]));
    }

    Err(RasterError::Metadata(
        "no georeferencing: need ModelPixelScale + ModelTiepoint or ModelTransformation"
            .to_string(),
    ))
}
