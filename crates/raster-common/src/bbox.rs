//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::crs::CrsCode;
use crate::error::RasterError;

/// An axis-aligned rectangle in a named coordinate reference system.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS (UTM zones, EPSG:3857, etc.), coordinates are in meters.
///
/// Construction through [`GeoBBox::new`] guarantees `west < east` and
/// `south < north`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub crs: CrsCode,
}

impl GeoBBox {
    /// Create a new bounding box, rejecting zero-area or inverted extents.
    pub fn new(
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        crs: CrsCode,
    ) -> Result<Self, RasterError> {
        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(RasterError::InvalidInput(format!(
                "non-finite bbox coordinates: [{}, {}, {}, {}]",
                west, south, east, north
            )));
        }
        if west >= east || south >= north {
            return Err(RasterError::InvalidInput(format!(
                "degenerate bbox: west={} east={} south={} north={}",
                west, east, south, north
            )));
        }

        Ok(Self {
            west,
            south,
            east,
            north,
            crs,
        })
    }

    /// Create a WGS84 (lon/lat) bounding box.
    pub fn geographic(west: f64, south: f64, east: f64, north: f64) -> Result<Self, RasterError> {
        Self::new(west, south, east, north, CrsCode::WGS84)
    }

    /// Parse a "west,south,east,north" string.
    pub fn from_bbox_string(s: &str, crs: CrsCode) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Self::new(values[0], values[1], values[2], values[3], crs)
            .map_err(|e| BboxParseError::Degenerate(e.to_string()))
    }

    /// Axis-aligned bound of a set of points, or `None` if the points do not
    /// span a positive area.
    pub fn from_points<I>(points: I, crs: CrsCode) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for (x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        Self::new(min_x, min_y, max_x, max_y, crs).ok()
    }

    /// The four corners: south-west, south-east, north-east, north-west.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.west, self.south),
            (self.east, self.south),
            (self.east, self.north),
            (self.west, self.north),
        ]
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Check if this bbox intersects another (same CRS assumed).
    pub fn intersects(&self, other: &GeoBBox) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.west && x <= self.east && y >= self.south && y <= self.north
    }

    /// Check if another bbox lies entirely inside this one.
    pub fn contains(&self, other: &GeoBBox) -> bool {
        other.west >= self.west
            && other.east <= self.east
            && other.south >= self.south
            && other.north <= self.north
    }

    /// The same extent tagged with a different CRS.
    pub fn with_crs(self, crs: CrsCode) -> Self {
        Self { crs, ..self }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'west,south,east,north'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),

    #[error("Degenerate BBOX: {0}")]
    Degenerate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = GeoBBox::from_bbox_string("14.1,45.9,14.3,46.1", CrsCode::WGS84).unwrap();
        assert_eq!(bbox.west, 14.1);
        assert_eq!(bbox.south, 45.9);
        assert_eq!(bbox.east, 14.3);
        assert_eq!(bbox.north, 46.1);
        assert_eq!(bbox.crs, CrsCode::WGS84);
    }

    #[test]
    fn test_from_points() {
        let bbox = GeoBBox::from_points(
            [(3.0, 1.0), (1.0, 4.0), (2.0, -1.0), (0.5, 0.0)],
            CrsCode(32633),
        )
        .unwrap();
        assert_eq!(bbox.west, 0.5);
        assert_eq!(bbox.south, -1.0);
        assert_eq!(bbox.east, 3.0);
        assert_eq!(bbox.north, 4.0);

        assert!(GeoBBox::from_points([(1.0, 1.0), (1.0, 2.0)], CrsCode::WGS84).is_none());
        assert!(GeoBBox::from_points(Vec::new(), CrsCode::WGS84).is_none());
    }
}
