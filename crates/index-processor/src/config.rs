//! Configuration for the index pipeline.

use std::time::Duration;

use cog_reader::CogOptions;
use raster_common::CrsCode;
use serde::{Deserialize, Serialize};

use crate::ndvi::Calibration;

/// Configuration for the index pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Largest output width or height of a windowed read.
    pub max_output_dim: usize,

    /// Raw-to-reflectance scale factor.
    pub reflectance_scale: f64,

    /// Raw-to-reflectance offset, applied after scaling.
    pub reflectance_offset: f64,

    /// Index value above which a sample counts toward coverage.
    pub vegetation_threshold: f64,

    /// CRS assumed when a raster does not declare one.
    pub fallback_crs: CrsCode,

    /// Bytes fetched up front when opening a COG.
    pub header_bytes: usize,

    /// Largest gap between tiles still fetched in one request.
    pub merge_gap_bytes: u64,

    /// Backoff for rate-limited requests.
    pub retry: RetryConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_output_dim: 1024,
            // Sentinel-2 L2A, processing baseline 04.00 and later
            reflectance_scale: 0.0001,
            reflectance_offset: -0.1,
            vegetation_threshold: 0.3,
            fallback_crs: CrsCode(32633),
            header_bytes: 16 * 1024,
            merge_gap_bytes: 64 * 1024,
            retry: RetryConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dim) = env_parse("NDVI_MAX_OUTPUT_DIM") {
            config.max_output_dim = dim;
        }

        if let Some(scale) = env_parse("NDVI_REFLECTANCE_SCALE") {
            config.reflectance_scale = scale;
        }

        if let Some(offset) = env_parse("NDVI_REFLECTANCE_OFFSET") {
            config.reflectance_offset = offset;
        }

        if let Some(threshold) = env_parse("NDVI_VEGETATION_THRESHOLD") {
            config.vegetation_threshold = threshold;
        }

        if let Ok(val) = std::env::var("NDVI_FALLBACK_CRS") {
            if let Ok(crs) = CrsCode::from_epsg_string(&val) {
                config.fallback_crs = crs;
            }
        }

        if let Some(bytes) = env_parse("NDVI_HEADER_BYTES") {
            config.header_bytes = bytes;
        }

        if let Some(gap) = env_parse("NDVI_MERGE_GAP_BYTES") {
            config.merge_gap_bytes = gap;
        }

        if let Some(ms) = env_parse("NDVI_RETRY_INITIAL_MS") {
            config.retry.initial_delay_ms = ms;
        }

        if let Some(attempts) = env_parse("NDVI_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = attempts;
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_output_dim == 0 {
            return Err("max_output_dim must be > 0".to_string());
        }

        if !(self.reflectance_scale.is_finite() && self.reflectance_scale > 0.0) {
            return Err("reflectance_scale must be a positive number".to_string());
        }

        if !self.reflectance_offset.is_finite() {
            return Err("reflectance_offset must be finite".to_string());
        }

        if !(-1.0..=1.0).contains(&self.vegetation_threshold) {
            return Err("vegetation_threshold must be within [-1, 1]".to_string());
        }

        if self.header_bytes < 16 {
            return Err("header_bytes must be at least 16".to_string());
        }

        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be > 0".to_string());
        }

        Ok(())
    }

    /// Reflectance calibration for raw samples.
    pub fn calibration(&self) -> Calibration {
        Calibration {
            scale: self.reflectance_scale,
            offset: self.reflectance_offset,
        }
    }

    /// Options for opening COG sources.
    pub fn cog_options(&self) -> CogOptions {
        CogOptions {
            header_bytes: self.header_bytes,
            merge_gap_bytes: self.merge_gap_bytes,
            fallback_crs: self.fallback_crs,
        }
    }
}

/// Exponential backoff applied to rate-limited requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry; doubles for each further retry.
    pub initial_delay_ms: u64,

    /// Total attempts including the first.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 800,
            max_attempts: 4,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.trim().parse().ok())
}
