//! The raster source contract consumed by the index pipeline.

use std::fmt;

use async_trait::async_trait;
use raster_common::{BandWindow, CrsCode, GeoBBox, GeoTransform, RasterResult, WindowPlan};

/// A non-fatal problem found while decoding metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataWarning {
    /// The CRS could not be read from the file and `assumed` was substituted.
    /// Reprojection against it may be approximate.
    CrsFallback { assumed: CrsCode, reason: String },
}

impl fmt::Display for MetadataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataWarning::CrsFallback { assumed, reason } => {
                write!(f, "CRS unknown ({}), assuming {}", reason, assumed)
            }
        }
    }
}

/// Georeferencing and layout of an opened raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub geo_transform: GeoTransform,
    /// Full-resolution width in pixels.
    pub width: usize,
    /// Full-resolution height in pixels.
    pub height: usize,
    /// Raw sample value marking missing pixels.
    pub nodata: Option<f32>,
    /// Number of reduced-resolution levels available.
    pub overview_count: usize,
    pub warnings: Vec<MetadataWarning>,
}

impl RasterMetadata {
    pub fn crs(&self) -> CrsCode {
        self.geo_transform.crs
    }

    /// Native extent of the full-resolution raster.
    pub fn bounds(&self) -> RasterResult<GeoBBox> {
        self.geo_transform.bounds(self.width, self.height)
    }

    /// Whether the CRS was substituted rather than read from the file.
    pub fn crs_is_assumed(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, MetadataWarning::CrsFallback { .. }))
    }
}

/// An opened raster supporting metadata access and windowed reads.
///
/// Metadata is decoded once when the source is opened and never changes.
#[async_trait]
pub trait RasterSource: Send + Sync {
    /// Name used in logs and error messages.
    fn identifier(&self) -> &str;

    fn metadata(&self) -> &RasterMetadata;

    /// Read one band's pixel window resampled to the plan's output size.
    ///
    /// Returns exactly `out_width * out_height` row-major samples.
    async fn read_window(&self, plan: &WindowPlan) -> RasterResult<BandWindow>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_warning_display() {
        let warning = MetadataWarning::CrsFallback {
            assumed: CrsCode(32633),
            reason: "no GeoKey directory".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "CRS unknown (no GeoKey directory), assuming EPSG:32633"
        );
    }
}
