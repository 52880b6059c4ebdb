//! Error types for index computation.

use raster_common::{RasterError, Stage};
use thiserror::Error;

use crate::catalog::BandRole;

/// Errors that can occur while computing an index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// A stage failed while fetching one band.
    #[error("{band} band: {source}")]
    Band { band: BandRole, source: RasterError },

    /// A stage failed outside any single band (the index computation itself).
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// The catalog asset keys do not identify a distinct red and NIR band.
    #[error("cannot resolve band assets: {0}")]
    AmbiguousBands(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl IndexError {
    /// Wrap a raster error with the band it occurred on.
    pub fn band(band: BandRole, source: RasterError) -> Self {
        Self::Band { band, source }
    }

    /// The pipeline stage that failed, if the error came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Band { source, .. } | Self::Raster(source) => Some(source.stage()),
            Self::AmbiguousBands(_) | Self::Config(_) => None,
        }
    }

    /// The band being processed when the error occurred.
    pub fn band_role(&self) -> Option<BandRole> {
        match self {
            Self::Band { band, .. } => Some(*band),
            _ => None,
        }
    }
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_error_context() {
        let err = IndexError::band(BandRole::Nir, RasterError::Fetch("connection reset".into()));
        assert_eq!(err.to_string(), "nir band: Fetch failed: connection reset");
        assert_eq!(err.stage(), Some(Stage::Fetch));
        assert_eq!(err.band_role(), Some(BandRole::Nir));
    }

    #[test]
    fn test_raster_error_converts() {
        let err: IndexError = RasterError::InvalidInput("zero-size window".into()).into();
        assert_eq!(err.stage(), Some(Stage::Input));
        assert_eq!(err.band_role(), None);
    }
}
