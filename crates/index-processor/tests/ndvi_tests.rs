//! Index computation over representative band windows.

use index_processor::{compute_index, Calibration};
use raster_common::BandWindow;
use test_utils::{assert_approx_eq, create_band_with_holes, create_gradient_band, reflectance_to_dn};

const S2_L2A: Calibration = Calibration {
    scale: 0.0001,
    offset: -0.1,
};

fn band(values: Vec<f32>, width: usize, height: usize) -> BandWindow {
    BandWindow::new(values, width, height, None).unwrap()
}

fn dn_band(values: Vec<u16>, width: usize, height: usize, nodata: Option<f32>) -> BandWindow {
    BandWindow::new(values.into_iter().map(f32::from).collect(), width, height, nodata).unwrap()
}

/// Deterministic values in [0, 1).
fn pseudo_random(seed: u64, n: usize) -> Vec<f32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 40) as f32 / (1u64 << 24) as f32
        })
        .collect()
}

#[test]
fn test_scenario_red_02_nir_05() {
    let red = dn_band(vec![reflectance_to_dn(0.2, 0.0001, -0.1); 16], 4, 4, None);
    let nir = dn_band(vec![reflectance_to_dn(0.5, 0.0001, -0.1); 16], 4, 4, None);

    let result = compute_index(&red, &nir, &S2_L2A, 0.3).unwrap();

    assert_eq!((result.width, result.height), (4, 4));
    for value in &result.values {
        assert_approx_eq!(*value, 0.4286, 1e-4);
    }
    assert_approx_eq!(result.stats.mean, 0.4286, 1e-4);
    assert_eq!(result.stats.coverage_pct, 100.0);
    assert_eq!(result.stats.valid_count, 16);
}

#[test]
fn test_equal_reflectance_is_exactly_zero() {
    for r in [0.01f32, 0.1, 0.33, 0.5, 0.999, 1.0] {
        let red = band(vec![r; 9], 3, 3);
        let nir = band(vec![r; 9], 3, 3);
        let result = compute_index(&red, &nir, &Calibration::IDENTITY, 0.3).unwrap();
        assert!(result.values.iter().all(|v| *v == 0.0), "reflectance {}", r);
    }
}

#[test]
fn test_zero_reflectance_after_calibration_is_nodata() {
    // DN below 1000 calibrates to 0 under the -0.1 offset
    let red = dn_band(vec![0, 500, 800], 3, 1, None);
    let nir = dn_band(vec![0, 900, 999], 3, 1, None);
    let result = compute_index(&red, &nir, &S2_L2A, 0.3).unwrap();

    assert!(result.values.iter().all(|v| v.is_nan()));
    assert_eq!(result.stats.valid_count, 0);
    assert_eq!(result.stats.mean, 0.0);
}

#[test]
fn test_values_bounded_and_stats_ordered() {
    for seed in 1..=25u64 {
        let red = band(pseudo_random(seed, 64), 8, 8);
        let nir = band(pseudo_random(seed * 7919, 64), 8, 8);
        let result = compute_index(&red, &nir, &Calibration::IDENTITY, 0.3).unwrap();

        for value in result.values.iter().filter(|v| !v.is_nan()) {
            assert!((-1.0..=1.0).contains(value), "seed {}: {}", seed, value);
        }

        let stats = result.stats;
        if stats.valid_count > 0 {
            assert!(stats.min <= stats.mean && stats.mean <= stats.max, "seed {}: {:?}", seed, stats);
            assert!((0.0..=100.0).contains(&stats.coverage_pct));
        }
    }
}

#[test]
fn test_out_of_range_raw_values_are_clamped() {
    // Reflectance above 1 or below 0 clamps before the ratio
    let red = band(vec![-0.5, 0.0, 2.0], 3, 1);
    let nir = band(vec![0.5, 3.0, 1.0], 3, 1);
    let result = compute_index(&red, &nir, &Calibration::IDENTITY, 0.3).unwrap();
    assert_eq!(result.values[0], 1.0);
    assert_eq!(result.values[1], 1.0);
    assert_eq!(result.values[2], 0.0);
}

#[test]
fn test_holes_excluded_from_stats() {
    let width = 10;
    let height = 10;
    let red = create_band_with_holes(width, height, 1500.0, 0.0, &[(0, 0), (5, 5), (9, 9)]);
    let red = BandWindow::new(red, width, height, Some(0.0)).unwrap();
    let nir = dn_band(vec![5000; width * height], width, height, Some(0.0));

    let result = compute_index(&red, &nir, &S2_L2A, 0.3).unwrap();
    assert_eq!(result.stats.valid_count, 97);
    assert_eq!(result.stats.total_count, 100);
    assert!(result.value(5, 5).is_none());
    assert!(result.value(4, 5).is_some());
}

#[test]
fn test_gradient_coverage() {
    // NIR fixed at 0.5; red sweeps 0..0.5 in steps of 0.05 so NDVI sweeps 1..0
    let width = 11;
    let red = dn_band(create_gradient_band(width, 1, 1000, 6000), width, 1, None);
    let nir = dn_band(vec![6000; width], width, 1, None);
    let result = compute_index(&red, &nir, &S2_L2A, 0.3).unwrap();

    // red up to 0.25 gives NDVI >= 0.333; red 0.3 gives 0.25
    let above = result.values.iter().filter(|v| **v > 0.3).count();
    assert_eq!(above, 6);
    assert_approx_eq!(result.stats.coverage_pct, 600.0 / 11.0, 1e-3);
    assert_approx_eq!(result.stats.max, 1.0, 1e-6);
}
