//! Derived per-pixel index fields.

use serde::{Deserialize, Serialize};

/// Marker for samples without a computed index value.
pub const NO_DATA: f32 = f32::NAN;

/// Summary statistics over the valid samples of an index field.
///
/// All fields are zero when there are no valid samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub min: f32,
    pub mean: f32,
    pub max: f32,
    /// Percentage (0-100) of valid samples above the vegetation threshold.
    pub coverage_pct: f32,
    /// Number of valid samples.
    pub valid_count: usize,
    /// Number of samples in the field, valid or not.
    pub total_count: usize,
}

/// A scalar index field in [-1, 1] with `NO_DATA` holes, plus statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexResult {
    /// Row-major values; `NaN` marks no-data.
    pub values: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub stats: IndexStats,
}

impl IndexResult {
    /// Get the value at a coordinate, `None` when out of range or no-data.
    pub fn value(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.values
            .get(row * self.width + col)
            .copied()
            .filter(|v| !v.is_nan())
    }

    /// Get the total number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the field is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_skips_nodata() {
        let result = IndexResult {
            values: vec![0.5, NO_DATA],
            width: 2,
            height: 1,
            stats: IndexStats::default(),
        };
        assert_eq!(result.value(0, 0), Some(0.5));
        assert_eq!(result.value(1, 0), None);
        assert_eq!(result.value(0, 1), None);
        assert_eq!(result.len(), 2);
    }
}
