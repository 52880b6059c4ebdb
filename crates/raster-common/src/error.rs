//! Error taxonomy for windowed raster access.

use std::fmt;

use thiserror::Error;

/// Result type alias using RasterError.
pub type RasterResult<T> = Result<T, RasterError>;

/// Primary error type for metadata decoding, reprojection and windowed reads.
///
/// An AOI that does not overlap the raster is not an error; see
/// [`crate::WindowMapping::EmptyIntersection`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RasterError {
    /// Raster header unreadable or malformed.
    #[error("Invalid raster metadata: {0}")]
    Metadata(String),

    /// Coordinate transform undefined for the requested CRS pair.
    #[error("Projection error: {0}")]
    Projection(String),

    /// Network failure during a range read or URL signing.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The upstream provider answered with a rate-limit response.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Corrupt or unsupported tile data.
    #[error("Failed to decode raster data: {0}")]
    Decode(String),

    /// Degenerate geometry or inconsistent inputs.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RasterError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            RasterError::Metadata(_) => Stage::Metadata,
            RasterError::Projection(_) => Stage::Projection,
            RasterError::Fetch(_) | RasterError::RateLimited(_) => Stage::Fetch,
            RasterError::Decode(_) => Stage::Decode,
            RasterError::InvalidInput(_) => Stage::Input,
        }
    }

    /// Whether the request may succeed if retried after a backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RasterError::RateLimited(_))
    }
}

/// Stage of the index computation an error surfaced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Metadata,
    Projection,
    Fetch,
    Decode,
    Input,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Metadata => "metadata",
            Stage::Projection => "projection",
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Input => "input",
        };
        write!(f, "{}", name)
    }
}

impl From<std::io::Error> for RasterError {
    fn from(err: std::io::Error) -> Self {
        RasterError::Fetch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(RasterError::Metadata("x".into()).stage(), Stage::Metadata);
        assert_eq!(RasterError::RateLimited("x".into()).stage(), Stage::Fetch);
        assert_eq!(RasterError::InvalidInput("x".into()).stage(), Stage::Input);
        assert_eq!(Stage::Decode.to_string(), "decode");
    }

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(RasterError::RateLimited("429".into()).is_rate_limited());
        assert!(!RasterError::Fetch("500".into()).is_rate_limited());
        assert!(!RasterError::Decode("bad tile".into()).is_rate_limited());
    }
}
