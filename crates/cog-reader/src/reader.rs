//! Cloud-optimized GeoTIFF reader: metadata on open, windowed reads after.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use raster_common::{BandWindow, CrsCode, RasterError, RasterResult, WindowPlan};
use tracing::{debug, info, instrument};

use crate::decode::ChunkDecoder;
use crate::directory::{is_mask, read_directories};
use crate::geokeys::decode_georeferencing;
use crate::image::ImageLevel;
use crate::range::RangeReader;
use crate::source::{RasterMetadata, RasterSource};
use crate::tiff::{tags, ByteOrder};

/// Options for opening a COG.
#[derive(Debug, Clone, PartialEq)]
pub struct CogOptions {
    /// Bytes fetched up front to cover the header and IFDs.
    pub header_bytes: usize,
    /// Neighbouring chunks separated by at most this many bytes are fetched
    /// in one request.
    pub merge_gap_bytes: u64,
    /// CRS assumed when the GeoKeys do not name one.
    pub fallback_crs: CrsCode,
}

impl Default for CogOptions {
    fn default() -> Self {
        Self {
            header_bytes: 16 * 1024,
            merge_gap_bytes: 64 * 1024,
            fallback_crs: CrsCode(32633),
        }
    }
}

/// An opened COG. Metadata is decoded once in [`CogReader::open`].
pub struct CogReader {
    reader: Arc<dyn RangeReader>,
    order: ByteOrder,
    /// Full resolution first, then overviews from finest to coarsest.
    levels: Vec<ImageLevel>,
    metadata: RasterMetadata,
    merge_gap_bytes: u64,
}

/// One coalesced byte range covering several chunks.
struct FetchGroup {
    start: u64,
    end: u64,
    chunks: Vec<(usize, u64, u64)>,
}

impl CogReader {
    /// Read the header and IFDs and decode the georeferencing.
    ///
    /// Touches only the header prefix plus any tag arrays beyond it.
    #[instrument(skip(reader, options), fields(source = %reader.identifier()))]
    pub async fn open(reader: Arc<dyn RangeReader>, options: &CogOptions) -> RasterResult<Self> {
        let prefix = reader.read_range(0, options.header_bytes).await?;
        let (header, directories) = read_directories(reader.as_ref(), prefix).await?;

        let mut directories = directories.into_iter();
        let first = directories
            .next()
            .ok_or_else(|| RasterError::Metadata("TIFF has no image directories".to_string()))?;
        let full = ImageLevel::from_tags(&first)?;
        let (geo_transform, warnings) = decode_georeferencing(&first, options.fallback_crs)?;
        let nodata = first.ascii(tags::GDAL_NODATA).and_then(parse_nodata);

        let mut overviews = Vec::new();
        for directory in directories {
            if is_mask(&directory) {
                debug!("Skipping mask IFD");
                continue;
            }
            let level = ImageLevel::from_tags(&directory)?;
            if level.is_overview() && level.width < full.width && level.height <= full.height {
                overviews.push(level);
            }
        }
        overviews.sort_by(|a, b| b.width.cmp(&a.width));

        let metadata = RasterMetadata {
            geo_transform,
            width: full.width,
            height: full.height,
            nodata,
            overview_count: overviews.len(),
            warnings,
        };

        info!(
            width = full.width,
            height = full.height,
            crs = %geo_transform.crs,
            overviews = overviews.len(),
            tiled = full.grid.tiled,
            "Opened COG"
        );

        let mut levels = vec![full];
        levels.extend(overviews);

        Ok(Self {
            reader,
            order: header.order,
            levels,
            metadata,
            merge_gap_bytes: options.merge_gap_bytes,
        })
    }

    /// All resolution levels, full resolution first.
    pub fn levels(&self) -> &[ImageLevel] {
        &self.levels
    }

    /// The coarsest level that still has at least the requested output
    /// resolution over the window.
    fn select_level(&self, plan: &WindowPlan) -> usize {
        let full = &self.levels[0];
        let win_w = plan.window.width() as f64;
        let win_h = plan.window.height() as f64;

        (1..self.levels.len())
            .rev()
            .find(|&i| {
                let level = &self.levels[i];
                let level_w = win_w * level.width as f64 / full.width as f64;
                let level_h = win_h * level.height as f64 / full.height as f64;
                level_w >= plan.out_width as f64 && level_h >= plan.out_height as f64
            })
            .unwrap_or(0)
    }

    async fn fetch_window(&self, plan: &WindowPlan) -> RasterResult<BandWindow> {
        let window = plan.window;
        if window.is_empty()
            || !window.fits_within(self.metadata.width, self.metadata.height)
            || plan.out_width == 0
            || plan.out_height == 0
        {
            return Err(RasterError::InvalidInput(format!(
                "window {:?} at {}x{} does not fit a {}x{} raster",
                window, plan.out_width, plan.out_height, self.metadata.width, self.metadata.height
            )));
        }

        let level_index = self.select_level(plan);
        let level = &self.levels[level_index];
        let decoder = ChunkDecoder::new(&level.encoding, self.order)?;

        // Nearest-neighbour sample positions at pixel centres, in level pixels
        let cols = sample_positions(
            window.col0,
            window.width(),
            plan.out_width,
            self.metadata.width,
            level.width,
        );
        let rows = sample_positions(
            window.row0,
            window.height(),
            plan.out_height,
            self.metadata.height,
            level.height,
        );

        let chunk_cols: BTreeSet<usize> = cols.iter().map(|c| c / level.grid.chunk_width).collect();
        let chunk_rows: BTreeSet<usize> = rows.iter().map(|r| r / level.grid.chunk_height).collect();
        let needed: Vec<usize> = chunk_rows
            .iter()
            .flat_map(|r| chunk_cols.iter().map(move |c| r * level.grid.across + c))
            .collect();

        let chunks = self.fetch_chunks(level, &decoder, &needed).await?;

        let fill = self.metadata.nodata.unwrap_or(0.0);
        let mut samples = Vec::with_capacity(plan.out_width * plan.out_height);
        for &row in &rows {
            for &col in &cols {
                let index = level.grid.chunk_index(col, row);
                let value = chunks.get(&index).map_or(fill, |data| {
                    let local = (row % level.grid.chunk_height) * level.grid.chunk_width
                        + col % level.grid.chunk_width;
                    data.get(local).copied().unwrap_or(fill)
                });
                samples.push(value);
            }
        }

        debug!(
            level = level_index,
            chunks = needed.len(),
            out_width = plan.out_width,
            out_height = plan.out_height,
            "Window read complete"
        );
        BandWindow::new(samples, plan.out_width, plan.out_height, self.metadata.nodata)
    }

    /// Fetch and decode chunks, coalescing nearby byte ranges and issuing
    /// one request at a time. Empty chunks are left out of the result.
    async fn fetch_chunks(
        &self,
        level: &ImageLevel,
        decoder: &ChunkDecoder,
        needed: &[usize],
    ) -> RasterResult<HashMap<usize, Vec<f32>>> {
        let mut ranges = Vec::with_capacity(needed.len());
        for &index in needed {
            let (offset, len) = level.chunk_range(index).ok_or_else(|| {
                RasterError::Metadata(format!("chunk {} has no offset entry", index))
            })?;
            if len > 0 {
                ranges.push((index, offset, len));
            }
        }
        ranges.sort_by_key(|(_, offset, _)| *offset);

        let groups = coalesce(ranges, self.merge_gap_bytes);
        let mut decoded = HashMap::with_capacity(needed.len());
        let mut bytes_fetched = 0u64;

        for group in &groups {
            let len = (group.end - group.start) as usize;
            let bytes = self.reader.read_range(group.start, len).await?;
            if bytes.len() < len {
                return Err(RasterError::Decode(format!(
                    "truncated chunk data: expected {} bytes at {}, got {}",
                    len,
                    group.start,
                    bytes.len()
                )));
            }
            bytes_fetched += bytes.len() as u64;

            for &(index, offset, chunk_len) in &group.chunks {
                let at = (offset - group.start) as usize;
                let raw = &bytes[at..at + chunk_len as usize];
                let rows = level.grid.chunk_rows(index, level.height);
                decoded.insert(index, decoder.decode(raw, level.grid.chunk_width, rows)?);
            }
        }

        debug!(
            chunks = decoded.len(),
            requests = groups.len(),
            bytes = bytes_fetched,
            "Fetched chunks"
        );
        Ok(decoded)
    }
}

#[async_trait]
impl RasterSource for CogReader {
    fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    #[instrument(skip(self), fields(source = %self.reader.identifier()))]
    async fn read_window(&self, plan: &WindowPlan) -> RasterResult<BandWindow> {
        self.fetch_window(plan).await
    }
}

/// Level pixel indices sampled for each output pixel along one axis.
fn sample_positions(
    start: usize,
    span: usize,
    out: usize,
    full_size: usize,
    level_size: usize,
) -> Vec<usize> {
    let step = span as f64 / out as f64;
    let ratio = level_size as f64 / full_size as f64;
    (0..out)
        .map(|i| {
            let full = start as f64 + (i as f64 + 0.5) * step;
            ((full * ratio).floor() as usize).min(level_size - 1)
        })
        .collect()
}

/// Merge sorted `(index, offset, len)` ranges whose gaps are at most `gap`.
fn coalesce(ranges: Vec<(usize, u64, u64)>, gap: u64) -> Vec<FetchGroup> {
    let mut groups: Vec<FetchGroup> = Vec::new();
    for (index, offset, len) in ranges {
        let end = offset + len;
        match groups.last_mut() {
            Some(group) if offset <= group.end.saturating_add(gap) => {
                group.end = group.end.max(end);
                group.chunks.push((index, offset, len));
            }
            _ => groups.push(FetchGroup {
                start: offset,
                end,
                chunks: vec![(index, offset, len)],
            }),
        }
    }
    groups
}

fn parse_nodata(text: &str) -> Option<f32> {
    let value = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match value.parse::<f64>() {
        Ok(v) => Some(v as f32),
        Err(_) => {
            debug!(value, "Ignoring unparseable GDAL_NODATA");
            None
        }
    }
}
