//! Pixel window mapping over representative rasters and AOIs.

use index_processor::{map_window, output_size};
use projection::{reproject_bbox, Projector};
use raster_common::{CrsCode, GeoBBox, GeoTransform, WindowMapping};

const UTM_33N: CrsCode = CrsCode(32633);

/// 1000x1000 pixels of 30 m from (500000, 4000000).
fn raster() -> GeoTransform {
    GeoTransform::new(500000.0, 4000000.0, 30.0, -30.0, UTM_33N).unwrap()
}

fn native(west: f64, south: f64, east: f64, north: f64) -> GeoBBox {
    GeoBBox::new(west, south, east, north, UTM_33N).unwrap()
}

#[test]
fn test_scenario_window_100_to_200() {
    let bbox = native(503000.0, 3994000.0, 506000.0, 3997000.0);
    let mapping = map_window(&raster(), &bbox, 1000, 1000, 1024).unwrap();
    let plan = mapping.plan().unwrap();

    assert_eq!(
        (plan.window.col0, plan.window.row0, plan.window.col1, plan.window.row1),
        (100, 100, 200, 200)
    );
    assert_eq!((plan.window.width(), plan.window.height()), (100, 100));
    assert_eq!((plan.out_width, plan.out_height), (100, 100));
}

#[test]
fn test_aoi_north_of_raster_is_empty() {
    let bbox = native(505000.0, 4001000.0, 510000.0, 4005000.0);
    let mapping = map_window(&raster(), &bbox, 1000, 1000, 1024).unwrap();
    assert_eq!(mapping, WindowMapping::EmptyIntersection);
}

#[test]
fn test_aois_outside_every_edge_are_empty() {
    let outside = [
        native(400000.0, 3980000.0, 499000.0, 3990000.0), // west
        native(531000.0, 3980000.0, 540000.0, 3990000.0), // east
        native(505000.0, 3900000.0, 510000.0, 3969000.0), // south
        native(505000.0, 4000000.0, 510000.0, 4010000.0), // touching north edge
        native(400000.0, 4100000.0, 450000.0, 4200000.0), // diagonal
    ];
    for bbox in outside {
        let mapping = map_window(&raster(), &bbox, 1000, 1000, 1024).unwrap();
        assert!(mapping.is_empty(), "{:?} should not intersect", bbox);
    }
}

#[test]
fn test_aois_inside_give_contained_windows() {
    for i in 0..20 {
        let step = i as f64 * 1234.5;
        let west = 500010.0 + step;
        let north = 3999990.0 - step * 0.7;
        let bbox = native(west, north - 2000.0 - step * 0.1, west + 500.0 + step * 0.3, north);

        let mapping = map_window(&raster(), &bbox, 1000, 1000, 1024).unwrap();
        let plan = mapping.plan().expect("inside AOI must intersect");
        assert!(!plan.window.is_empty());
        assert!(plan.window.fits_within(1000, 1000), "{:?}", plan.window);
    }
}

#[test]
fn test_geographic_aoi_inside_footprint() {
    let to_geographic = Projector::new(UTM_33N, CrsCode::WGS84).unwrap();
    let (west, south) = to_geographic.project_point(505000.0, 3975000.0).unwrap();
    let (east, north) = to_geographic.project_point(525000.0, 3995000.0).unwrap();
    let aoi = GeoBBox::geographic(west, south, east, north).unwrap();

    let native = reproject_bbox(&aoi, UTM_33N).unwrap();
    let mapping = map_window(&raster(), &native, 1000, 1000, 1024).unwrap();
    let plan = mapping.plan().unwrap();

    assert!(plan.window.fits_within(1000, 1000));
    // Roughly the 20 km square, widened a little by the corner bound
    assert!(plan.window.width() >= 660 && plan.window.width() < 700);
    assert!(plan.window.height() >= 660 && plan.window.height() < 700);
}

#[test]
fn test_output_never_exceeds_max_dim_and_keeps_aspect() {
    let windows = [(1, 1), (7, 3), (100, 100), (999, 1), (1000, 640), (333, 1000), (1000, 1000)];
    for max_dim in [1, 37, 100, 512, 1024] {
        for (w, h) in windows {
            let (out_w, out_h) = output_size(w, h, max_dim);
            assert!(out_w >= 1 && out_h >= 1);
            assert!(out_w <= max_dim && out_h <= max_dim, "{}x{} @ {}", w, h, max_dim);
            assert!(out_w <= w && out_h <= h, "upsampled {}x{}", w, h);

            // Aspect preserved to within one pixel on the shorter side
            let (long_out, short_out, long, short) = if w >= h {
                (out_w, out_h, w, h)
            } else {
                (out_h, out_w, h, w)
            };
            let expected = long_out as f64 * short as f64 / long as f64;
            assert!(
                (short_out as f64 - expected).abs() <= 1.0,
                "{}x{} -> {}x{} @ {}",
                w,
                h,
                out_w,
                out_h,
                max_dim
            );
        }
    }
}

#[test]
fn test_large_window_downsampled() {
    let bbox = native(500000.0, 3970000.0, 530000.0, 4000000.0);
    let plan = *map_window(&raster(), &bbox, 1000, 1000, 256).unwrap().plan().unwrap();
    assert_eq!((plan.window.width(), plan.window.height()), (1000, 1000));
    assert_eq!((plan.out_width, plan.out_height), (256, 256));
}
