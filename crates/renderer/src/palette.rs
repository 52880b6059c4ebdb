//! Named color ramps for index rendering.
//!
//! Stops are evenly spaced over [0, 1] in the order listed; values between
//! stops are interpolated linearly per channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gradient::{interpolate_color, Color};

/// One palette stop. Its position is implied by its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorStop {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const fn stop(hex: u32) -> ColorStop {
    ColorStop {
        r: (hex >> 16) as u8,
        g: (hex >> 8) as u8,
        b: hex as u8,
    }
}

// ColorBrewer RdYlGn, 11 classes
const RD_YL_GN: &[ColorStop] = &[
    stop(0xa50026),
    stop(0xd73027),
    stop(0xf46d43),
    stop(0xfdae61),
    stop(0xfee08b),
    stop(0xffffbf),
    stop(0xd9ef8b),
    stop(0xa6d96a),
    stop(0x66bd63),
    stop(0x1a9850),
    stop(0x006837),
];

const VIRIDIS: &[ColorStop] = &[
    stop(0x440154),
    stop(0x472d7b),
    stop(0x3b528b),
    stop(0x2c728e),
    stop(0x21918c),
    stop(0x28ae80),
    stop(0x5ec962),
    stop(0xaddc30),
    stop(0xfde725),
];

// ColorBrewer Greens, 9 classes
const GREENS: &[ColorStop] = &[
    stop(0xf7fcf5),
    stop(0xe5f5e0),
    stop(0xc7e9c0),
    stop(0xa1d99b),
    stop(0x74c476),
    stop(0x41ab5d),
    stop(0x238b45),
    stop(0x006d2c),
    stop(0x00441b),
];

const MAGMA: &[ColorStop] = &[
    stop(0x000004),
    stop(0x1c1044),
    stop(0x4f127b),
    stop(0x812581),
    stop(0xb5367a),
    stop(0xe55964),
    stop(0xfb8761),
    stop(0xfec287),
    stop(0xfcfdbf),
];

const GRAYSCALE: &[ColorStop] = &[stop(0x000000), stop(0xffffff)];

/// The palettes available for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Red (bare) through yellow to green (dense vegetation).
    #[default]
    RdYlGn,
    Viridis,
    Greens,
    Magma,
    Grayscale,
}

impl Palette {
    pub const ALL: [Palette; 5] = [
        Palette::RdYlGn,
        Palette::Viridis,
        Palette::Greens,
        Palette::Magma,
        Palette::Grayscale,
    ];

    /// Look up a palette by name, ignoring case. Unknown names give the
    /// default palette.
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_default()
    }

    /// Look up a palette by name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Palette::RdYlGn => "rdylgn",
            Palette::Viridis => "viridis",
            Palette::Greens => "greens",
            Palette::Magma => "magma",
            Palette::Grayscale => "grayscale",
        }
    }

    pub fn stops(&self) -> &'static [ColorStop] {
        match self {
            Palette::RdYlGn => RD_YL_GN,
            Palette::Viridis => VIRIDIS,
            Palette::Greens => GREENS,
            Palette::Magma => MAGMA,
            Palette::Grayscale => GRAYSCALE,
        }
    }

    /// Opaque color at `t` in [0, 1]. Values outside clamp to the end
    /// stops; NaN maps to the first stop.
    pub fn color_at(&self, t: f32) -> Color {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        let segments = stops.len() - 1;
        let scaled = t * segments as f32;
        let index = (scaled.floor() as usize).min(segments - 1);
        let frac = scaled - index as f32;

        interpolate_color(stops[index].into(), stops[index + 1].into(), frac)
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ColorStop> for Color {
    fn from(stop: ColorStop) -> Self {
        Color::new(stop.r, stop.g, stop.b, 255)
    }
}
