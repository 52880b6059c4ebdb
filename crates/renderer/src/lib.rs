//! Color rendering of vegetation index fields.
//!
//! - Palettes: a closed set of named color ramps with linear interpolation
//! - Gradient: index field to RGBA raster, plus legend strips
//! - PNG: RGBA encoding for the rendered rasters

pub mod gradient;
pub mod palette;
pub mod png;

pub use gradient::{
    interpolate_color, normalize_index, render_field, render_index, render_legend, Color,
    ColorRaster,
};
pub use palette::{ColorStop, Palette};
pub use png::create_png;
