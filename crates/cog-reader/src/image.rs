//! Layout of one resolution level: size, chunk grid and sample encoding.

use raster_common::{RasterError, RasterResult};

use crate::tiff::{tags, TagSet};

const SUBFILE_REDUCED: u64 = 1;

/// Tile or strip grid of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGrid {
    pub chunk_width: usize,
    pub chunk_height: usize,
    pub across: usize,
    pub down: usize,
    pub tiled: bool,
}

impl ChunkGrid {
    /// Index of the chunk holding a pixel of the first sample plane.
    pub fn chunk_index(&self, col: usize, row: usize) -> usize {
        (row / self.chunk_height) * self.across + col / self.chunk_width
    }

    /// Rows of pixel data stored in a chunk; the last strip may be short.
    pub fn chunk_rows(&self, index: usize, image_height: usize) -> usize {
        if self.tiled {
            return self.chunk_height;
        }
        let row0 = (index / self.across) * self.chunk_height;
        self.chunk_height.min(image_height.saturating_sub(row0))
    }
}

/// Sample encoding fields, validated when a chunk decoder is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub compression: u16,
    pub predictor: u16,
    pub bits_per_sample: u16,
    pub sample_format: u16,
    /// Samples interleaved per pixel inside a chunk.
    pub samples_per_pixel: usize,
}

/// One IFD describing the full-resolution image or an overview.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLevel {
    pub width: usize,
    pub height: usize,
    pub grid: ChunkGrid,
    pub encoding: Encoding,
    pub subfile_type: u64,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl ImageLevel {
    pub fn from_tags(directory: &TagSet) -> RasterResult<Self> {
        let width = required(directory, tags::IMAGE_WIDTH)? as usize;
        let height = required(directory, tags::IMAGE_LENGTH)? as usize;
        if width == 0 || height == 0 {
            return Err(RasterError::Metadata(format!(
                "image has zero size ({}x{})",
                width, height
            )));
        }

        let samples_per_pixel = directory.u64(tags::SAMPLES_PER_PIXEL).unwrap_or(1).max(1) as usize;
        let planar = directory.u64(tags::PLANAR_CONFIGURATION).unwrap_or(1);

        let (grid, offsets, byte_counts) = if directory.contains(tags::TILE_WIDTH) {
            let chunk_width = required(directory, tags::TILE_WIDTH)? as usize;
            let chunk_height = required(directory, tags::TILE_LENGTH)? as usize;
            if chunk_width == 0 || chunk_height == 0 {
                return Err(RasterError::Metadata("zero tile size".to_string()));
            }
            let grid = ChunkGrid {
                chunk_width,
                chunk_height,
                across: width.div_ceil(chunk_width),
                down: height.div_ceil(chunk_height),
                tiled: true,
            };
            (
                grid,
                required_array(directory, tags::TILE_OFFSETS)?,
                required_array(directory, tags::TILE_BYTE_COUNTS)?,
            )
        } else {
            let rows_per_strip = directory
                .u64(tags::ROWS_PER_STRIP)
                .map_or(height, |r| (r as usize).clamp(1, height));
            let grid = ChunkGrid {
                chunk_width: width,
                chunk_height: rows_per_strip,
                across: 1,
                down: height.div_ceil(rows_per_strip),
                tiled: false,
            };
            (
                grid,
                required_array(directory, tags::STRIP_OFFSETS)?,
                required_array(directory, tags::STRIP_BYTE_COUNTS)?,
            )
        };

        let planes = if planar == 2 { samples_per_pixel } else { 1 };
        let expected = grid.across * grid.down * planes;
        if offsets.len() < expected || byte_counts.len() < expected {
            return Err(RasterError::Metadata(format!(
                "expected {} chunks, found {} offsets and {} byte counts",
                expected,
                offsets.len(),
                byte_counts.len()
            )));
        }

        let encoding = Encoding {
            compression: directory.u64(tags::COMPRESSION).unwrap_or(1) as u16,
            predictor: directory.u64(tags::PREDICTOR).unwrap_or(1) as u16,
            bits_per_sample: directory.u64(tags::BITS_PER_SAMPLE).unwrap_or(1) as u16,
            sample_format: directory.u64(tags::SAMPLE_FORMAT).unwrap_or(1) as u16,
            // Separate planes store one sample per pixel in each chunk
            samples_per_pixel: if planar == 2 { 1 } else { samples_per_pixel },
        };

        Ok(Self {
            width,
            height,
            grid,
            encoding,
            subfile_type: directory.u64(tags::NEW_SUBFILE_TYPE).unwrap_or(0),
            offsets,
            byte_counts,
        })
    }

    /// Whether this is a reduced-resolution copy of the main image.
    pub fn is_overview(&self) -> bool {
        self.subfile_type & SUBFILE_REDUCED != 0
    }

    /// File range `(offset, length)` of a chunk of the first sample plane.
    pub fn chunk_range(&self, index: usize) -> Option<(u64, u64)> {
        Some((*self.offsets.get(index)?, *self.byte_counts.get(index)?))
    }
}

fn required(directory: &TagSet, tag: u16) -> RasterResult<u64> {
    directory
        .u64(tag)
        .ok_or_else(|| RasterError::Metadata(format!("missing required TIFF tag {}", tag)))
}

fn required_array(directory: &TagSet, tag: u16) -> RasterResult<Vec<u64>> {
    directory
        .u64s(tag)
        .ok_or_else(|| RasterError::Metadata(format!("missing required TIFF tag {}", tag)))
}
