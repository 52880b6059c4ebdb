//! Synthetic GeoTIFF generator.
//!
//! Creates small little-endian classic TIFF files laid out the way a
//! cloud-optimized GeoTIFF is: every IFD (full resolution first, then
//! overviews) at the start of the file, followed by the tile or strip data.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

// TIFF field types
const SHORT: u16 = 3;
const LONG: u16 = 4;
const ASCII: u16 = 2;
const DOUBLE: u16 = 12;

/// Sample values for one band.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl SampleData {
    fn len(&self) -> usize {
        match self {
            SampleData::U8(v) => v.len(),
            SampleData::U16(v) => v.len(),
            SampleData::F32(v) => v.len(),
        }
    }

    fn bits_per_sample(&self) -> u16 {
        match self {
            SampleData::U8(_) => 8,
            SampleData::U16(_) => 16,
            SampleData::F32(_) => 32,
        }
    }

    fn sample_format(&self) -> u16 {
        match self {
            SampleData::U8(_) | SampleData::U16(_) => 1,
            SampleData::F32(_) => 3,
        }
    }

    /// Nearest-neighbour decimation by `factor`, sampling the top-left pixel
    /// of each block.
    fn decimate(&self, width: usize, height: usize, factor: usize) -> (SampleData, usize, usize) {
        let out_w = width.div_ceil(factor);
        let out_h = height.div_ceil(factor);
        let indices: Vec<usize> = (0..out_h)
            .flat_map(|row| (0..out_w).map(move |col| row * factor * width + col * factor))
            .collect();

        let data = match self {
            SampleData::U8(v) => SampleData::U8(indices.iter().map(|&i| v[i]).collect()),
            SampleData::U16(v) => SampleData::U16(indices.iter().map(|&i| v[i]).collect()),
            SampleData::F32(v) => SampleData::F32(indices.iter().map(|&i| v[i]).collect()),
        };
        (data, out_w, out_h)
    }

    /// Encode a rectangle as little-endian bytes, zero-padding outside the
    /// image, optionally with horizontal differencing.
    fn encode_block(
        &self,
        width: usize,
        height: usize,
        col0: usize,
        row0: usize,
        block_w: usize,
        block_h: usize,
        predictor: bool,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        for row in row0..row0 + block_h {
            let inside = |col: usize| row < height && col < width;
            match self {
                SampleData::U8(v) => {
                    let mut prev = 0u8;
                    for col in col0..col0 + block_w {
                        let value = if inside(col) { v[row * width + col] } else { 0 };
                        let stored = if predictor { value.wrapping_sub(prev) } else { value };
                        prev = value;
                        out.push(stored);
                    }
                }
                SampleData::U16(v) => {
                    let mut prev = 0u16;
                    for col in col0..col0 + block_w {
                        let value = if inside(col) { v[row * width + col] } else { 0 };
                        let stored = if predictor { value.wrapping_sub(prev) } else { value };
                        prev = value;
                        out.extend_from_slice(&stored.to_le_bytes());
                    }
                }
                SampleData::F32(v) => {
                    assert!(!predictor, "horizontal predictor needs integer samples");
                    for col in col0..col0 + block_w {
                        let value = if inside(col) { v[row * width + col] } else { 0.0 };
                        out.extend_from_slice(&value.to_le_bytes());
                    }
                }
            }
        }
        out
    }
}

/// Coordinate reference system keys written to the GeoKey directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKeys {
    /// ProjectedCSTypeGeoKey with an EPSG code.
    Projected(u16),
    /// GeographicTypeGeoKey with an EPSG code.
    Geographic(u16),
    /// ProjectedCSTypeGeoKey = 32767 (user-defined).
    UserDefined,
    /// No GeoKey directory at all.
    Missing,
}

/// Georeferencing written to the file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Georef {
    /// ModelPixelScale + ModelTiepoint anchored at pixel (0, 0).
    ScaleTiepoint {
        origin_x: f64,
        origin_y: f64,
        x_res: f64,
        y_res: f64,
    },
    /// ModelTransformation with optional row/column rotation terms.
    Transformation {
        origin_x: f64,
        origin_y: f64,
        x_res: f64,
        y_res: f64,
        rotation: f64,
    },
    /// No georeferencing tags.
    Missing,
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    Tiled { tile_width: usize, tile_height: usize },
    Stripped { rows_per_strip: usize },
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    data: Vec<u8>,
}

impl Entry {
    fn shorts(tag: u16, values: &[u16]) -> Self {
        Self {
            tag,
            field_type: SHORT,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn longs(tag: u16, values: &[u32]) -> Self {
        Self {
            tag,
            field_type: LONG,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn doubles(tag: u16, values: &[f64]) -> Self {
        Self {
            tag,
            field_type: DOUBLE,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn ascii(tag: u16, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            field_type: ASCII,
            count: data.len() as u32,
            data,
        }
    }

    /// Bytes stored outside the IFD, padded to a word boundary.
    fn external_len(&self) -> usize {
        if self.data.len() <= 4 {
            0
        } else {
            self.data.len() + self.data.len() % 2
        }
    }
}

struct Level {
    chunks: Vec<Vec<u8>>,
    entries: Vec<Entry>,
}

/// Builds GeoTIFF bytes for tests.
///
/// Defaults: zero-filled `u16` band, 8x8 tiles, uncompressed,
/// UTM 33N at origin (500000, 4000000) with 10 m pixels.
pub struct GeoTiffBuilder {
    width: usize,
    height: usize,
    data: SampleData,
    layout: Layout,
    deflate: bool,
    predictor: bool,
    georef: Georef,
    crs: CrsKeys,
    pixel_is_point: bool,
    nodata: Option<String>,
    overview_levels: usize,
    mask: bool,
}

impl GeoTiffBuilder {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: SampleData::U16(vec![0; width * height]),
            layout: Layout::Tiled {
                tile_width: 8,
                tile_height: 8,
            },
            deflate: false,
            predictor: false,
            georef: Georef::ScaleTiepoint {
                origin_x: 500000.0,
                origin_y: 4000000.0,
                x_res: 10.0,
                y_res: -10.0,
            },
            crs: CrsKeys::Projected(32633),
            pixel_is_point: false,
            nodata: None,
            overview_levels: 0,
            mask: false,
        }
    }

    pub fn with_data(mut self, data: SampleData) -> Self {
        assert_eq!(data.len(), self.width * self.height, "sample count mismatch");
        self.data = data;
        self
    }

    pub fn with_u16(self, values: Vec<u16>) -> Self {
        self.with_data(SampleData::U16(values))
    }

    pub fn with_f32(self, values: Vec<f32>) -> Self {
        self.with_data(SampleData::F32(values))
    }

    /// Tile dimensions; TIFF requires multiples of 16 but the reader does not.
    pub fn with_tiles(mut self, tile_width: usize, tile_height: usize) -> Self {
        self.layout = Layout::Tiled {
            tile_width,
            tile_height,
        };
        self
    }

    pub fn with_strips(mut self, rows_per_strip: usize) -> Self {
        self.layout = Layout::Stripped { rows_per_strip };
        self
    }

    pub fn with_deflate(mut self) -> Self {
        self.deflate = true;
        self
    }

    pub fn with_predictor(mut self) -> Self {
        self.predictor = true;
        self
    }

    pub fn with_geotransform(mut self, origin_x: f64, origin_y: f64, x_res: f64, y_res: f64) -> Self {
        self.georef = Georef::ScaleTiepoint {
            origin_x,
            origin_y,
            x_res,
            y_res,
        };
        self
    }

    pub fn with_georef(mut self, georef: Georef) -> Self {
        self.georef = georef;
        self
    }

    pub fn with_crs(mut self, crs: CrsKeys) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_pixel_is_point(mut self) -> Self {
        self.pixel_is_point = true;
        self
    }

    pub fn with_nodata(mut self, nodata: &str) -> Self {
        self.nodata = Some(nodata.to_string());
        self
    }

    /// Add `levels` overviews, each half the size of the previous one.
    pub fn with_overviews(mut self, levels: usize) -> Self {
        self.overview_levels = levels;
        self
    }

    /// Add an internal mask IFD after the full-resolution image.
    pub fn with_mask(mut self) -> Self {
        self.mask = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut levels = vec![self.level(&self.data, self.width, self.height, 0)];
        if self.mask {
            let mask = SampleData::U8(vec![255; self.width * self.height]);
            levels.push(self.level(&mask, self.width, self.height, 4));
        }
        for k in 1..=self.overview_levels {
            let (data, w, h) = self.data.decimate(self.width, self.height, 1 << k);
            levels.push(self.level(&data, w, h, 1));
        }
        levels[0].entries.extend(self.geo_entries());
        for level in &mut levels {
            level.entries.sort_by_key(|e| e.tag);
        }

        // IFDs first, chunk data after
        let ifd_len = |level: &Level| {
            2 + 12 * level.entries.len() + 4
                + level.entries.iter().map(Entry::external_len).sum::<usize>()
        };
        let mut ifd_offsets = Vec::with_capacity(levels.len());
        let mut cursor = 8;
        for level in &levels {
            ifd_offsets.push(cursor);
            cursor += ifd_len(level);
        }

        for level in &mut levels {
            let mut offsets = Vec::with_capacity(level.chunks.len());
            for chunk in &level.chunks {
                offsets.push(cursor as u32);
                cursor += chunk.len();
            }
            let offset_tag = if level.entries.iter().any(|e| e.tag == 324) { 324 } else { 273 };
            if let Some(entry) = level.entries.iter_mut().find(|e| e.tag == offset_tag) {
                *entry = Entry::longs(offset_tag, &offsets);
            }
        }

        let mut out = Vec::with_capacity(cursor);
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&(ifd_offsets[0] as u32).to_le_bytes());

        for (i, level) in levels.iter().enumerate() {
            let start = ifd_offsets[i];
            let mut external = start + 2 + 12 * level.entries.len() + 4;
            let mut tail = Vec::new();

            out.extend_from_slice(&(level.entries.len() as u16).to_le_bytes());
            for entry in &level.entries {
                out.extend_from_slice(&entry.tag.to_le_bytes());
                out.extend_from_slice(&entry.field_type.to_le_bytes());
                out.extend_from_slice(&entry.count.to_le_bytes());
                if entry.data.len() <= 4 {
                    let mut inline = entry.data.clone();
                    inline.resize(4, 0);
                    out.extend_from_slice(&inline);
                } else {
                    out.extend_from_slice(&(external as u32).to_le_bytes());
                    tail.extend_from_slice(&entry.data);
                    if entry.data.len() % 2 == 1 {
                        tail.push(0);
                    }
                    external += entry.external_len();
                }
            }
            let next = ifd_offsets.get(i + 1).copied().unwrap_or(0) as u32;
            out.extend_from_slice(&next.to_le_bytes());
            out.extend_from_slice(&tail);
        }

        for level in &levels {
            for chunk in &level.chunks {
                out.extend_from_slice(chunk);
            }
        }
        out
    }

    fn level(&self, data: &SampleData, width: usize, height: usize, subfile_type: u32) -> Level {
        let predictor = self.predictor && subfile_type != 4;
        let mut entries = vec![
            Entry::longs(256, &[width as u32]),
            Entry::longs(257, &[height as u32]),
            Entry::shorts(258, &[data.bits_per_sample()]),
            Entry::shorts(259, &[if self.deflate { 8 } else { 1 }]),
            Entry::shorts(262, &[1]),
            Entry::shorts(277, &[1]),
            Entry::shorts(284, &[1]),
            Entry::shorts(339, &[data.sample_format()]),
        ];
        if subfile_type != 0 {
            entries.push(Entry::longs(254, &[subfile_type]));
        }
        if predictor {
            entries.push(Entry::shorts(317, &[2]));
        }

        let blocks: Vec<(usize, usize, usize, usize)> = match self.layout {
            Layout::Tiled {
                tile_width,
                tile_height,
            } => {
                let across = width.div_ceil(tile_width);
                let down = height.div_ceil(tile_height);
                entries.push(Entry::longs(322, &[tile_width as u32]));
                entries.push(Entry::longs(323, &[tile_height as u32]));
                (0..down)
                    .flat_map(|r| {
                        (0..across).map(move |c| (c * tile_width, r * tile_height, tile_width, tile_height))
                    })
                    .collect()
            }
            Layout::Stripped { rows_per_strip } => {
                entries.push(Entry::longs(278, &[rows_per_strip as u32]));
                (0..height.div_ceil(rows_per_strip))
                    .map(|s| {
                        let row0 = s * rows_per_strip;
                        (0, row0, width, rows_per_strip.min(height - row0))
                    })
                    .collect()
            }
        };

        let chunks: Vec<Vec<u8>> = blocks
            .iter()
            .map(|&(col0, row0, w, h)| {
                let raw = data.encode_block(width, height, col0, row0, w, h, predictor);
                if self.deflate {
                    deflate(&raw)
                } else {
                    raw
                }
            })
            .collect();

        let counts: Vec<u32> = chunks.iter().map(|c| c.len() as u32).collect();
        let placeholder = vec![0u32; chunks.len()];
        match self.layout {
            Layout::Tiled { .. } => {
                entries.push(Entry::longs(324, &placeholder));
                entries.push(Entry::longs(325, &counts));
            }
            Layout::Stripped { .. } => {
                entries.push(Entry::longs(273, &placeholder));
                entries.push(Entry::longs(279, &counts));
            }
        }

        Level { chunks, entries }
    }

    fn geo_entries(&self) -> Vec<Entry> {
        let mut entries = Vec::new();

        match self.georef {
            Georef::ScaleTiepoint {
                origin_x,
                origin_y,
                x_res,
                y_res,
            } => {
                entries.push(Entry::doubles(33550, &[x_res, -y_res, 0.0]));
                entries.push(Entry::doubles(33922, &[0.0, 0.0, 0.0, origin_x, origin_y, 0.0]));
            }
            Georef::Transformation {
                origin_x,
                origin_y,
                x_res,
                y_res,
                rotation,
            } => {
                entries.push(Entry::doubles(
                    34264,
                    &[
                        x_res, rotation, 0.0, origin_x, //
                        rotation, y_res, 0.0, origin_y, //
                        0.0, 0.0, 0.0, 0.0, //
                        0.0, 0.0, 0.0, 1.0,
                    ],
                ));
            }
            Georef::Missing => {}
        }

        let raster_type = if self.pixel_is_point { 2 } else { 1 };
        let keys: Vec<[u16; 4]> = match self.crs {
            CrsKeys::Projected(code) => vec![[1024, 0, 1, 1], [1025, 0, 1, raster_type], [3072, 0, 1, code]],
            CrsKeys::Geographic(code) => vec![[1024, 0, 1, 2], [1025, 0, 1, raster_type], [2048, 0, 1, code]],
            CrsKeys::UserDefined => vec![[1024, 0, 1, 1], [1025, 0, 1, raster_type], [3072, 0, 1, 32767]],
            CrsKeys::Missing if self.pixel_is_point => vec![[1025, 0, 1, raster_type]],
            CrsKeys::Missing => Vec::new(),
        };
        if !keys.is_empty() {
            let mut directory = vec![1, 1, 0, keys.len() as u16];
            for key in keys {
                directory.extend_from_slice(&key);
            }
            entries.push(Entry::shorts(34735, &directory));
        }

        if let Some(nodata) = &self.nodata {
            entries.push(Entry::ascii(42113, nodata));
        }

        entries
    }
}

fn deflate(raw: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).expect("writing to a Vec cannot fail");
    encoder.finish().expect("writing to a Vec cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_header_points_at_first_ifd() {
        let bytes = GeoTiffBuilder::new(4, 4).build();
        assert_eq!(&bytes[0..2], b"II");
        assert_eq!(read_u16(&bytes, 2), 42);
        assert_eq!(read_u32(&bytes, 4), 8);
    }

    #[test]
    fn test_overviews_chain_ifds() {
        let bytes = GeoTiffBuilder::new(16, 16).with_overviews(2).build();
        let mut offset = read_u32(&bytes, 4) as usize;
        let mut count = 0;
        while offset != 0 {
            count += 1;
            let entries = read_u16(&bytes, offset) as usize;
            offset = read_u32(&bytes, offset + 2 + 12 * entries) as usize;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_uncompressed_strip_holds_samples() {
        let bytes = GeoTiffBuilder::new(2, 1)
            .with_strips(1)
            .with_u16(vec![0x0102, 0x0304])
            .build();
        let tail = &bytes[bytes.len() - 4..];
        assert_eq!(tail, &[0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn test_decimate_samples_block_corners() {
        let data = SampleData::U16((0..16).collect());
        let (small, w, h) = data.decimate(4, 4, 2);
        assert_eq!((w, h), (2, 2));
        assert_eq!(small, SampleData::U16(vec![0, 2, 8, 10]));
    }
}
