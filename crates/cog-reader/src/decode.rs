//! Tile and strip decoding to `f32` samples.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::ZlibDecoder;
use raster_common::{RasterError, RasterResult};

use crate::image::Encoding;
use crate::tiff::ByteOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Deflate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleKind {
    Uint,
    Int,
    Float,
}

/// Decodes chunks of one image level.
#[derive(Debug, Clone, Copy)]
pub struct ChunkDecoder {
    compression: Compression,
    horizontal_predictor: bool,
    kind: SampleKind,
    bytes_per_sample: usize,
    samples_per_pixel: usize,
    order: ByteOrder,
}

impl ChunkDecoder {
    /// Validate an encoding, failing with `Decode` for anything unsupported.
    pub fn new(encoding: &Encoding, order: ByteOrder) -> RasterResult<Self> {
        let compression = match encoding.compression {
            1 => Compression::None,
            8 | 32946 => Compression::Deflate,
            other => {
                return Err(RasterError::Decode(format!(
                    "unsupported TIFF compression {}",
                    other
                )))
            }
        };

        let kind = match encoding.sample_format {
            1 => SampleKind::Uint,
            2 => SampleKind::Int,
            3 => SampleKind::Float,
            other => {
                return Err(RasterError::Decode(format!(
                    "unsupported sample format {}",
                    other
                )))
            }
        };

        let bits = encoding.bits_per_sample;
        let valid_bits = match kind {
            SampleKind::Uint | SampleKind::Int => matches!(bits, 8 | 16 | 32 | 64),
            SampleKind::Float => matches!(bits, 32 | 64),
        };
        if !valid_bits {
            return Err(RasterError::Decode(format!(
                "unsupported {:?} sample size of {} bits",
                kind, bits
            )));
        }

        let horizontal_predictor = match (encoding.predictor, kind) {
            (1, _) => false,
            (2, SampleKind::Uint | SampleKind::Int) => true,
            (predictor, kind) => {
                return Err(RasterError::Decode(format!(
                    "unsupported predictor {} for {:?} samples",
                    predictor, kind
                )))
            }
        };

        Ok(Self {
            compression,
            horizontal_predictor,
            kind,
            bytes_per_sample: bits as usize / 8,
            samples_per_pixel: encoding.samples_per_pixel.max(1),
            order,
        })
    }

    /// Decode a chunk of `width x rows` pixels, returning the first sample
    /// of each pixel.
    pub fn decode(&self, raw: &[u8], width: usize, rows: usize) -> RasterResult<Vec<f32>> {
        let data = self.decompress(raw)?;

        let row_samples = width * self.samples_per_pixel;
        let expected = row_samples * rows * self.bytes_per_sample;
        if data.len() < expected {
            return Err(RasterError::Decode(format!(
                "chunk holds {} bytes, expected {} for {}x{} pixels",
                data.len(),
                expected,
                width,
                rows
            )));
        }

        let mut words: Vec<u64> = data[..expected]
            .chunks_exact(self.bytes_per_sample)
            .map(|c| self.order.word(c))
            .collect();

        if self.horizontal_predictor {
            let mask = match self.bytes_per_sample {
                8 => u64::MAX,
                n => (1u64 << (n * 8)) - 1,
            };
            let spp = self.samples_per_pixel;
            for row in words.chunks_exact_mut(row_samples) {
                for i in spp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - spp]) & mask;
                }
            }
        }

        Ok(words
            .iter()
            .step_by(self.samples_per_pixel)
            .map(|w| self.to_f32(*w))
            .collect())
    }

    fn decompress<'a>(&self, raw: &'a [u8]) -> RasterResult<Cow<'a, [u8]>> {
        match self.compression {
            Compression::None => Ok(Cow::Borrowed(raw)),
            Compression::Deflate => {
                let mut out = Vec::new();
                ZlibDecoder::new(raw)
                    .read_to_end(&mut out)
                    .map_err(|e| RasterError::Decode(format!("deflate stream is corrupt: {}", e)))?;
                Ok(Cow::Owned(out))
            }
        }
    }

    fn to_f32(&self, word: u64) -> f32 {
        let bits = self.bytes_per_sample * 8;
        match self.kind {
            SampleKind::Uint => word as f32,
            SampleKind::Int => {
                let shift = 64 - bits;
                ((word << shift) as i64 >> shift) as f32
            }
            SampleKind::Float if bits == 32 => f32::from_bits(word as u32),
            SampleKind::Float => f64::from_bits(word) as f32,
        }
    }
}
