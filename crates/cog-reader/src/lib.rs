//! Windowed access to remote cloud-optimized GeoTIFFs.
//!
//! Opening a source reads only the header and image directories through
//! HTTP range requests; each windowed read then fetches just the tiles or
//! strips its sample positions fall in, from the coarsest overview that
//! still satisfies the requested output size.

mod decode;
mod directory;
pub mod geokeys;
pub mod image;
pub mod range;
pub mod reader;
pub mod source;
pub mod tiff;

pub use range::{HttpRangeReader, MemoryRangeReader, RangeReader};
pub use reader::{CogOptions, CogReader};
pub use source::{MetadataWarning, RasterMetadata, RasterSource};
