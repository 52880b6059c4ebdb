//! Band generators for creating synthetic reflectance-like data.
//!
//! These generators create predictable, verifiable patterns that can be used
//! across the test suite.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify which source pixel a windowed read sampled
/// by checking that `grid[row * width + col] == col * 1000 + row`.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Same pattern as [`create_test_grid`] as 16-bit integers: `col * 256 + row`.
///
/// Requires `width <= 256` and `height <= 256` to stay unique.
pub fn create_test_grid_u16(width: usize, height: usize) -> Vec<u16> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 256 + row) as u16);
        }
    }
    data
}

/// Creates a band filled with a single digital number.
pub fn create_constant_band(width: usize, height: usize, value: u16) -> Vec<u16> {
    vec![value; width * height]
}

/// Creates a band whose digital numbers increase left to right from `min`
/// to `max`, identical on every row.
pub fn create_gradient_band(width: usize, height: usize, min: u16, max: u16) -> Vec<u16> {
    let mut data = Vec::with_capacity(width * height);
    let span = max.saturating_sub(min) as f32;
    for _row in 0..height {
        for col in 0..width {
            let t = if width > 1 {
                col as f32 / (width - 1) as f32
            } else {
                0.0
            };
            data.push(min + (t * span).round() as u16);
        }
    }
    data
}

/// Digital number that calibrates to `reflectance` under `dn * scale + offset`.
///
/// # Example
///
/// ```
/// use test_utils::reflectance_to_dn;
///
/// // Sentinel-2 L2A: scale 1e-4, offset -0.1
/// assert_eq!(reflectance_to_dn(0.2, 0.0001, -0.1), 3000);
/// ```
pub fn reflectance_to_dn(reflectance: f64, scale: f64, offset: f64) -> u16 {
    ((reflectance - offset) / scale).round() as u16
}

/// Creates a constant band of a given `f32` value with some cells replaced.
///
/// # Arguments
///
/// * `holes` - `(col, row)` positions set to `hole_value`
pub fn create_band_with_holes(
    width: usize,
    height: usize,
    value: f32,
    hole_value: f32,
    holes: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![value; width * height];
    for &(col, row) in holes {
        if col < width && row < height {
            data[row * width + col] = hole_value;
        }
    }
    data
}
