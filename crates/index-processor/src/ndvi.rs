//! Normalized difference vegetation index over two band windows.

use raster_common::{BandWindow, IndexResult, IndexStats, RasterError, RasterResult, NO_DATA};
use serde::{Deserialize, Serialize};

/// Linear conversion from raw samples to surface reflectance,
/// clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub scale: f64,
    pub offset: f64,
}

impl Calibration {
    /// Samples that are already reflectance.
    pub const IDENTITY: Calibration = Calibration {
        scale: 1.0,
        offset: 0.0,
    };

    pub fn reflectance(&self, raw: f32) -> f64 {
        (raw as f64 * self.scale + self.offset).clamp(0.0, 1.0)
    }
}

/// Compute NDVI from red and near-infrared windows.
///
/// Windows of slightly different size (independent rounding per band) are
/// trimmed to the common top-left `min(width) x min(height)` region. A sample
/// is no-data when either input is no-data or the calibrated reflectances
/// sum to zero. Statistics cover valid samples only and are all zero when
/// there are none.
pub fn compute_index(
    red: &BandWindow,
    nir: &BandWindow,
    calibration: &Calibration,
    vegetation_threshold: f64,
) -> RasterResult<IndexResult> {
    check_shape("red", red)?;
    check_shape("nir", nir)?;

    let width = red.width.min(nir.width);
    let height = red.height.min(nir.height);
    if width == 0 || height == 0 {
        return Err(RasterError::InvalidInput(format!(
            "band windows do not overlap: red {}x{}, nir {}x{}",
            red.width, red.height, nir.width, nir.height
        )));
    }

    let mut values = Vec::with_capacity(width * height);
    let mut accumulator = StatsAccumulator::new(vegetation_threshold);

    for row in 0..height {
        for col in 0..width {
            let r = red.samples[row * red.width + col];
            let n = nir.samples[row * nir.width + col];

            let value = if red.is_nodata(r) || nir.is_nodata(n) {
                NO_DATA
            } else {
                normalized_difference(calibration.reflectance(n), calibration.reflectance(r))
            };

            accumulator.push(value);
            values.push(value);
        }
    }

    Ok(IndexResult {
        values,
        width,
        height,
        stats: accumulator.finish(),
    })
}

/// Windows can be built field by field, so the sample count is rechecked.
fn check_shape(band: &str, window: &BandWindow) -> RasterResult<()> {
    if window.samples.len() != window.width * window.height {
        return Err(RasterError::InvalidInput(format!(
            "{} window has {} samples, expected {}x{}",
            band,
            window.samples.len(),
            window.width,
            window.height
        )));
    }
    Ok(())
}

/// `(a - b) / (a + b)`, or no-data when the sum is not positive.
fn normalized_difference(a: f64, b: f64) -> f32 {
    let denom = a + b;
    if denom > 0.0 {
        ((a - b) / denom).clamp(-1.0, 1.0) as f32
    } else {
        NO_DATA
    }
}

struct StatsAccumulator {
    threshold: f64,
    count: usize,
    total: usize,
    above: usize,
    sum: f64,
    min: f32,
    max: f32,
}

impl StatsAccumulator {
    fn new(threshold: f64) -> Self {
        Self {
            threshold,
            count: 0,
            total: 0,
            above: 0,
            sum: 0.0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }

    fn push(&mut self, value: f32) {
        self.total += 1;
        if value.is_nan() {
            return;
        }
        self.count += 1;
        self.sum += value as f64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        if value as f64 > self.threshold {
            self.above += 1;
        }
    }

    fn finish(self) -> IndexStats {
        if self.count == 0 {
            return IndexStats {
                total_count: self.total,
                ..IndexStats::default()
            };
        }

        let mean = (self.sum / self.count as f64) as f32;
        IndexStats {
            min: self.min,
            // Rounding must not push the mean outside [min, max]
            mean: mean.clamp(self.min, self.max),
            max: self.max,
            coverage_pct: (self.above as f64 / self.count as f64 * 100.0) as f32,
            valid_count: self.count,
            total_count: self.total,
        }
    }
}
