//! Reading the IFD chain through a range reader.
//!
//! A bounded prefix of the file is fetched up front; IFDs and tag arrays
//! that lie beyond it cost one extra range read each.

use std::collections::HashSet;

use bytes::Bytes;
use raster_common::{RasterError, RasterResult};
use tracing::{debug, warn};

use crate::range::RangeReader;
use crate::tiff::{tags, Ifd, TagSet, TagValue, TiffHeader};

/// Upper bound on directories followed in one file.
const MAX_DIRECTORIES: usize = 64;

/// NewSubfileType bit marking a transparency mask.
const SUBFILE_MASK: u64 = 4;

/// Header bytes already in memory plus the reader to fetch the rest.
struct HeaderBytes<'a> {
    reader: &'a dyn RangeReader,
    prefix: Bytes,
}

impl HeaderBytes<'_> {
    async fn get(&self, offset: u64, len: usize) -> RasterResult<Bytes> {
        let end = offset
            .checked_add(len as u64)
            .ok_or_else(|| RasterError::Metadata(format!("offset {} overflows", offset)))?;
        if end <= self.prefix.len() as u64 {
            return Ok(self.prefix.slice(offset as usize..end as usize));
        }

        debug!(offset, len, "Header data beyond prefix, fetching");
        let bytes = self.reader.read_range(offset, len).await?;
        if bytes.len() < len {
            return Err(RasterError::Metadata(format!(
                "truncated header data at offset {}: expected {} bytes, got {}",
                offset,
                len,
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

/// Parse the file header and every IFD in the chain, resolving the values
/// of the tags the reader understands.
///
/// Mask IFDs are returned with only their NewSubfileType resolved.
pub(crate) async fn read_directories(
    reader: &dyn RangeReader,
    prefix: Bytes,
) -> RasterResult<(TiffHeader, Vec<TagSet>)> {
    let header = TiffHeader::parse(&prefix)?;
    let source = HeaderBytes { reader, prefix };

    let mut directories = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = header.first_ifd;

    while offset != 0 {
        if !visited.insert(offset) {
            return Err(RasterError::Metadata(format!(
                "IFD chain loops back to offset {}",
                offset
            )));
        }
        if directories.len() == MAX_DIRECTORIES {
            warn!(max = MAX_DIRECTORIES, "Too many IFDs, ignoring the rest");
            break;
        }

        let count_bytes = source.get(offset, header.count_size()).await?;
        let count = header.entry_count(&count_bytes)?;
        let ifd_bytes = source.get(offset, header.ifd_size(count)).await?;
        let ifd = Ifd::parse(&ifd_bytes, &header)?;

        directories.push(resolve_tags(&source, &header, &ifd).await?);
        offset = ifd.next;
    }

    if directories.is_empty() {
        return Err(RasterError::Metadata("TIFF has no image directories".to_string()));
    }

    debug!(count = directories.len(), bigtiff = header.bigtiff, "Read IFD chain");
    Ok((header, directories))
}

async fn resolve_tags(
    source: &HeaderBytes<'_>,
    header: &TiffHeader,
    ifd: &Ifd,
) -> RasterResult<TagSet> {
    let mut values = TagSet::default();

    for &tag in tags::RESOLVED {
        let Some(entry) = ifd.entry(tag) else {
            continue;
        };

        let value = if entry.is_inline()? {
            TagValue::decode(entry.field_type, entry.count, &entry.value_field, header.order)?
        } else {
            let len = entry.byte_len()? as usize;
            let bytes = source.get(entry.value_offset(header.order), len).await?;
            TagValue::decode(entry.field_type, entry.count, &bytes, header.order)?
        };
        values.insert(tag, value);

        // NewSubfileType is resolved first; masks need nothing else
        if tag == tags::NEW_SUBFILE_TYPE && is_mask(&values) {
            break;
        }
    }

    Ok(values)
}

/// Whether a directory holds a transparency mask.
pub(crate) fn is_mask(directory: &TagSet) -> bool {
    directory
        .u64(tags::NEW_SUBFILE_TYPE)
        .map_or(false, |t| t & SUBFILE_MASK != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::MemoryRangeReader;
    use test_utils::GeoTiffBuilder;

    #[tokio::test]
    async fn test_reads_chain_from_prefix() {
        let bytes = GeoTiffBuilder::new(32, 32).with_overviews(2).build();
        let reader = MemoryRangeReader::new("mem", bytes.clone());
        let (header, dirs) = read_directories(&reader, Bytes::from(bytes)).await.unwrap();

        assert!(!header.bigtiff);
        assert_eq!(dirs.len(), 3);
        assert_eq!(dirs[0].u64(tags::IMAGE_WIDTH), Some(32));
        assert_eq!(dirs[1].u64(tags::IMAGE_WIDTH), Some(16));
        assert_eq!(dirs[2].u64(tags::IMAGE_WIDTH), Some(8));
        // Whole file was in the prefix
        assert_eq!(reader.requests(), 0);
    }

    #[tokio::test]
    async fn test_fetches_beyond_short_prefix() {
        let bytes = GeoTiffBuilder::new(32, 32).with_overviews(1).build();
        let reader = MemoryRangeReader::new("mem", bytes.clone());
        let prefix = Bytes::from(bytes[..16].to_vec());
        let (_, dirs) = read_directories(&reader, prefix).await.unwrap();

        assert_eq!(dirs.len(), 2);
        assert!(dirs[0].contains(tags::MODEL_PIXEL_SCALE));
        assert!(reader.requests() > 0);
    }

    #[tokio::test]
    async fn test_mask_directory_is_flagged() {
        let bytes = GeoTiffBuilder::new(16, 16).with_mask().build();
        let reader = MemoryRangeReader::new("mem", bytes.clone());
        let (_, dirs) = read_directories(&reader, Bytes::from(bytes)).await.unwrap();

        assert_eq!(dirs.len(), 2);
        assert!(!is_mask(&dirs[0]));
        assert!(is_mask(&dirs[1]));
        assert!(!dirs[1].contains(tags::IMAGE_WIDTH));
    }

    #[tokio::test]
    async fn test_rejects_ifd_loop() {
        // Header pointing at an IFD whose next pointer is itself
        let mut bytes = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&8u32.to_le_bytes());
        let reader = MemoryRangeReader::new("mem", bytes.clone());

        let result = read_directories(&reader, Bytes::from(bytes)).await;
        assert!(matches!(result, Err(RasterError::Metadata(_))));
    }
}
