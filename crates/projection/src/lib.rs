//! Coordinate reference system transformations.
//!
//! Point transforms go through proj4rs with PROJ.4 definitions from the
//! bundled EPSG database, so no native PROJ installation is needed.

pub mod reproject;
pub mod transform;

pub use reproject::reproject_bbox;
pub use transform::Projector;
