//! Coordinate Reference System identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An EPSG coordinate reference system code.
///
/// Only the numeric identifier is carried; projection parameters are looked
/// up on demand by the projection crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrsCode(pub u32);

impl CrsCode {
    /// WGS84 geographic (lon/lat in degrees).
    pub const WGS84: CrsCode = CrsCode(4326);

    /// Web Mercator (meters).
    pub const WEB_MERCATOR: CrsCode = CrsCode(3857);

    pub fn new(code: u32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    /// Parse a CRS string.
    ///
    /// Accepts formats like:
    /// - "EPSG:32633"
    /// - "epsg:4326"
    /// - "CRS:84" (equivalent to EPSG:4326 with lon/lat axis order)
    /// - "32633"
    pub fn from_epsg_string(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(CrsCode::WGS84);
        }

        let digits = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        digits
            .parse::<u32>()
            .ok()
            .filter(|code| *code > 0)
            .map(CrsCode)
            .ok_or_else(|| CrsParseError::UnsupportedCrs(s.to_string()))
    }

    /// PROJ.4 definition from the bundled EPSG database, if known.
    pub fn proj4(&self) -> Option<&'static str> {
        u16::try_from(self.0)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        match self.proj4() {
            Some(proj) => proj.contains("+proj=longlat"),
            // Geographic codes live in the 4000-4999 block
            None => (4000..5000).contains(&self.0),
        }
    }
}

impl Default for CrsCode {
    fn default() -> Self {
        CrsCode::WGS84
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(
            CrsCode::from_epsg_string("EPSG:4326").unwrap(),
            CrsCode::WGS84
        );
        assert_eq!(
            CrsCode::from_epsg_string("epsg:32633").unwrap(),
            CrsCode(32633)
        );
        assert_eq!(CrsCode::from_epsg_string("CRS:84").unwrap(), CrsCode::WGS84);
        assert_eq!(CrsCode::from_epsg_string("3857").unwrap(), CrsCode(3857));
        assert!(CrsCode::from_epsg_string("EPSG:abc").is_err());
        assert!(CrsCode::from_epsg_string("EPSG:0").is_err());
    }

    #[test]
    fn test_geographic_detection() {
        assert!(CrsCode::WGS84.is_geographic());
        assert!(CrsCode(4269).is_geographic());
        assert!(!CrsCode::WEB_MERCATOR.is_geographic());
        assert!(!CrsCode(32633).is_geographic());
    }

    #[test]
    fn test_display() {
        assert_eq!(CrsCode(32633).to_string(), "EPSG:32633");
    }
}
