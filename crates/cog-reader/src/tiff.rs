//! TIFF and BigTIFF header, IFD and tag value parsing.
//!
//! Parsing here is synchronous and works on byte slices; fetching the bytes
//! is the job of [`crate::directory`].

use std::collections::HashMap;

use raster_common::{RasterError, RasterResult};

/// TIFF tag numbers used by the reader.
pub mod tags {
    pub const NEW_SUBFILE_TYPE: u16 = 254;
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIGURATION: u16 = 284;
    pub const PREDICTOR: u16 = 317;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const SAMPLE_FORMAT: u16 = 339;
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const MODEL_TRANSFORMATION: u16 = 34264;
    pub const GEO_KEY_DIRECTORY: u16 = 34735;
    pub const GDAL_NODATA: u16 = 42113;

    /// Tags whose values are resolved when a directory is read.
    pub const RESOLVED: &[u16] = &[
        NEW_SUBFILE_TYPE,
        IMAGE_WIDTH,
        IMAGE_LENGTH,
        BITS_PER_SAMPLE,
        COMPRESSION,
        STRIP_OFFSETS,
        SAMPLES_PER_PIXEL,
        ROWS_PER_STRIP,
        STRIP_BYTE_COUNTS,
        PLANAR_CONFIGURATION,
        PREDICTOR,
        TILE_WIDTH,
        TILE_LENGTH,
        TILE_OFFSETS,
        TILE_BYTE_COUNTS,
        SAMPLE_FORMAT,
        MODEL_PIXEL_SCALE,
        MODEL_TIEPOINT,
        MODEL_TRANSFORMATION,
        GEO_KEY_DIRECTORY,
        GDAL_NODATA,
    ];
}

/// Upper bound on a single tag's value size.
const MAX_TAG_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    pub fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
        }
    }

    pub fn u64(self, bytes: [u8; 8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(bytes),
            ByteOrder::BigEndian => u64::from_be_bytes(bytes),
        }
    }

    /// Read an unsigned word of 1, 2, 4 or 8 bytes.
    pub fn word(self, bytes: &[u8]) -> u64 {
        match bytes.len() {
            1 => bytes[0] as u64,
            2 => self.u16([bytes[0], bytes[1]]) as u64,
            4 => self.u32([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            _ => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                self.u64(buf)
            }
        }
    }
}

/// Copy `N` bytes at `at`, failing with a metadata error when out of range.
fn take<const N: usize>(bytes: &[u8], at: usize) -> RasterResult<[u8; N]> {
    bytes
        .get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| {
            RasterError::Metadata(format!(
                "truncated TIFF structure: need {} bytes at {}, have {}",
                N,
                at,
                bytes.len()
            ))
        })
}

/// The fixed-size file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub order: ByteOrder,
    pub bigtiff: bool,
    pub first_ifd: u64,
}

impl TiffHeader {
    pub fn parse(bytes: &[u8]) -> RasterResult<Self> {
        let order = match take::<2>(bytes, 0)? {
            [b'I', b'I'] => ByteOrder::LittleEndian,
            [b'M', b'M'] => ByteOrder::BigEndian,
            other => {
                return Err(RasterError::Metadata(format!(
                    "not a TIFF file (byte order mark {:?})",
                    other
                )))
            }
        };

        match order.u16(take(bytes, 2)?) {
            42 => Ok(Self {
                order,
                bigtiff: false,
                first_ifd: order.u32(take(bytes, 4)?) as u64,
            }),
            43 => {
                let offset_size = order.u16(take(bytes, 4)?);
                if offset_size != 8 {
                    return Err(RasterError::Metadata(format!(
                        "unsupported BigTIFF offset size {}",
                        offset_size
                    )));
                }
                Ok(Self {
                    order,
                    bigtiff: true,
                    first_ifd: order.u64(take(bytes, 8)?),
                })
            }
            magic => Err(RasterError::Metadata(format!(
                "not a TIFF file (magic {})",
                magic
            ))),
        }
    }

    /// Size of the entry count at the start of an IFD.
    pub fn count_size(&self) -> usize {
        if self.bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of one IFD entry.
    pub fn entry_size(&self) -> usize {
        if self.bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of an offset (and of the inline value field).
    pub fn offset_size(&self) -> usize {
        if self.bigtiff {
            8
        } else {
            4
        }
    }

    /// Total size of an IFD with `entries` entries, including the next pointer.
    pub fn ifd_size(&self, entries: usize) -> usize {
        self.count_size() + entries * self.entry_size() + self.offset_size()
    }

    /// Read the entry count of an IFD from its first bytes.
    pub fn entry_count(&self, bytes: &[u8]) -> RasterResult<usize> {
        let count = if self.bigtiff {
            self.order.u64(take(bytes, 0)?)
        } else {
            self.order.u16(take(bytes, 0)?) as u64
        };
        usize::try_from(count)
            .ok()
            .filter(|c| *c <= u16::MAX as usize)
            .ok_or_else(|| RasterError::Metadata(format!("implausible IFD entry count {}", count)))
    }
}

/// Byte size of one value of a TIFF field type.
pub fn type_size(field_type: u16) -> Option<u64> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 | 13 => Some(4),
        5 | 10 | 12 | 16 | 17 | 18 => Some(8),
        _ => None,
    }
}

/// One IFD entry before its value is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u64,
    /// The inline value/offset field, `offset_size` bytes long.
    pub value_field: Vec<u8>,
}

impl RawEntry {
    /// Size of the value in bytes.
    pub fn byte_len(&self) -> RasterResult<u64> {
        let size = type_size(self.field_type).ok_or_else(|| {
            RasterError::Metadata(format!(
                "tag {} has unknown field type {}",
                self.tag, self.field_type
            ))
        })?;
        self.count
            .checked_mul(size)
            .filter(|len| *len <= MAX_TAG_BYTES)
            .ok_or_else(|| {
                RasterError::Metadata(format!(
                    "tag {} value is too large ({} x {} bytes)",
                    self.tag, self.count, size
                ))
            })
    }

    /// Whether the value is stored in the entry itself.
    pub fn is_inline(&self) -> RasterResult<bool> {
        Ok(self.byte_len()? <= self.value_field.len() as u64)
    }

    /// File offset of an out-of-line value.
    pub fn value_offset(&self, order: ByteOrder) -> u64 {
        order.word(&self.value_field)
    }
}

/// A parsed image file directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    pub entries: Vec<RawEntry>,
    /// Offset of the next IFD, 0 at the end of the chain.
    pub next: u64,
}

impl Ifd {
    /// Parse an IFD from bytes starting at its first byte.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> RasterResult<Self> {
        let count = header.entry_count(bytes)?;
        let order = header.order;
        let mut entries = Vec::with_capacity(count);

        for i in 0..count {
            let at = header.count_size() + i * header.entry_size();
            let tag = order.u16(take(bytes, at)?);
            let field_type = order.u16(take(bytes, at + 2)?);
            let (count, value_at) = if header.bigtiff {
                (order.u64(take(bytes, at + 4)?), at + 12)
            } else {
                (order.u32(take(bytes, at + 4)?) as u64, at + 8)
            };
            let value_field = bytes
                .get(value_at..value_at + header.offset_size())
                .ok_or_else(|| RasterError::Metadata(format!("truncated IFD entry {}", i)))?
                .to_vec();

            entries.push(RawEntry {
                tag,
                field_type,
                count,
                value_field,
            });
        }

        let next_at = header.count_size() + count * header.entry_size();
        let next = if header.bigtiff {
            order.u64(take(bytes, next_at)?)
        } else {
            order.u32(take(bytes, next_at)?) as u64
        };

        Ok(Self { entries, next })
    }

    pub fn entry(&self, tag: u16) -> Option<&RawEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

/// A decoded tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Ascii(String),
    Unsigned(Vec<u64>),
    Signed(Vec<i64>),
    Float(Vec<f64>),
    Undefined(Vec<u8>),
}

impl TagValue {
    /// Decode `count` values of `field_type` from `bytes`.
    pub fn decode(field_type: u16, count: u64, bytes: &[u8], order: ByteOrder) -> RasterResult<Self> {
        let size = type_size(field_type).ok_or_else(|| {
            RasterError::Metadata(format!("unknown TIFF field type {}", field_type))
        })? as usize;
        let count = count as usize;
        let data = bytes.get(..count * size).ok_or_else(|| {
            RasterError::Metadata(format!(
                "tag value truncated: need {} bytes, have {}",
                count * size,
                bytes.len()
            ))
        })?;
        let words = || data.chunks_exact(size).map(|c| order.word(c));

        let value = match field_type {
            1 => TagValue::Unsigned(data.iter().map(|b| *b as u64).collect()),
            2 => {
                let text = String::from_utf8_lossy(data);
                TagValue::Ascii(text.trim_end_matches('\0').to_string())
            }
            3 | 4 | 13 | 16 | 18 => TagValue::Unsigned(words().collect()),
            6 => TagValue::Signed(data.iter().map(|b| *b as i8 as i64).collect()),
            7 => TagValue::Undefined(data.to_vec()),
            8 => TagValue::Signed(words().map(|w| w as u16 as i16 as i64).collect()),
            9 => TagValue::Signed(words().map(|w| w as u32 as i32 as i64).collect()),
            17 => TagValue::Signed(words().map(|w| w as i64).collect()),
            5 | 10 => TagValue::Float(
                data.chunks_exact(8)
                    .map(|c| {
                        let num = order.word(&c[..4]) as u32;
                        let den = order.word(&c[4..]) as u32;
                        if field_type == 10 {
                            num as i32 as f64 / den as i32 as f64
                        } else {
                            num as f64 / den as f64
                        }
                    })
                    .collect(),
            ),
            11 => TagValue::Float(words().map(|w| f32::from_bits(w as u32) as f64).collect()),
            12 => TagValue::Float(words().map(f64::from_bits).collect()),
            other => {
                return Err(RasterError::Metadata(format!(
                    "unknown TIFF field type {}",
                    other
                )))
            }
        };
        Ok(value)
    }

    /// Values as unsigned integers, if the type is integral and non-negative.
    pub fn to_u64_vec(&self) -> Option<Vec<u64>> {
        match self {
            TagValue::Unsigned(v) => Some(v.clone()),
            TagValue::Signed(v) => v.iter().map(|x| u64::try_from(*x).ok()).collect(),
            _ => None,
        }
    }

    /// Values as floats, for any numeric type.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            TagValue::Unsigned(v) => Some(v.iter().map(|x| *x as f64).collect()),
            TagValue::Signed(v) => Some(v.iter().map(|x| *x as f64).collect()),
            TagValue::Float(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(s) => Some(s),
            _ => None,
        }
    }
}

/// Resolved tag values of one IFD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    values: HashMap<u16, TagValue>,
}

impl TagSet {
    pub fn insert(&mut self, tag: u16, value: TagValue) {
        self.values.insert(tag, value);
    }

    pub fn get(&self, tag: u16) -> Option<&TagValue> {
        self.values.get(&tag)
    }

    pub fn contains(&self, tag: u16) -> bool {
        self.values.contains_key(&tag)
    }

    pub fn u64s(&self, tag: u16) -> Option<Vec<u64>> {
        self.get(tag).and_then(TagValue::to_u64_vec)
    }

    /// First value of an integer tag.
    pub fn u64(&self, tag: u16) -> Option<u64> {
        self.u64s(tag).and_then(|v| v.first().copied())
    }

    pub fn f64s(&self, tag: u16) -> Option<Vec<f64>> {
        self.get(tag).and_then(TagValue::to_f64_vec)
    }

    pub fn ascii(&self, tag: u16) -> Option<&str> {
        self.get(tag).and_then(TagValue::as_str)
    }
}
