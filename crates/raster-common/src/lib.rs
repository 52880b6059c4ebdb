//! Common types shared across the windowed raster access crates.
//!
//! Everything here is a plain value: geo-referencing, areas of interest,
//! pixel windows, sampled band windows and derived index fields. None of
//! these types hold connections or caches.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod geotransform;
pub mod index;
pub mod window;

pub use bbox::{BboxParseError, GeoBBox};
pub use crs::CrsCode;
pub use error::{RasterError, RasterResult, Stage};
pub use geotransform::GeoTransform;
pub use index::{IndexResult, IndexStats, NO_DATA};
pub use window::{BandWindow, PixelWindow, WindowMapping, WindowPlan};
