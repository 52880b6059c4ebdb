//! Vegetation index computation over AOI windows of remote rasters.
//!
//! # Architecture
//!
//! ```text
//! IndexRequest (red href, nir href, geographic AOI)
//!      │
//!      ▼
//! IndexPipeline::run
//!      │
//!      ├─► red:  sign ─► open ─► reproject AOI ─► map window ─► read
//!      │                                              │
//!      │                                              └─► empty: stop
//!      │
//!      ├─► nir:  sign ─► open ─► reproject AOI ─► map window ─► read
//!      │
//!      └─► compute_index (calibrate, NDVI, stats)
//!               │
//!               ▼
//!          IndexOutcome
//! ```
//!
//! Every network step runs under the rate-limit [`RetryPolicy`], and the
//! steps never overlap.
//!
//! # Example
//!
//! ```ignore
//! use index_processor::{IndexConfig, IndexPipeline, IndexRequest, PassthroughSigner};
//! use raster_common::GeoBBox;
//!
//! let pipeline = IndexPipeline::http(PassthroughSigner, IndexConfig::from_env())?;
//! let request = IndexRequest {
//!     red_href: "https://example.com/B04.tif".into(),
//!     nir_href: "https://example.com/B08.tif".into(),
//!     aoi: GeoBBox::geographic(14.40, 45.00, 14.45, 45.05)?,
//! };
//! match pipeline.run(&request).await? {
//!     IndexOutcome::Computed(report) => println!("mean {}", report.result.stats.mean),
//!     IndexOutcome::EmptyIntersection { .. } => println!("no overlap"),
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod ndvi;
pub mod pipeline;
pub mod retry;
pub mod signer;
pub mod window;

// Re-export commonly used types at crate root
pub use catalog::{resolve_band_keys, resolve_band_keys_with, BandKeys, BandRole};
pub use config::{IndexConfig, RetryConfig};
pub use error::{IndexError, Result};
pub use ndvi::{compute_index, Calibration};
pub use pipeline::{
    BandWarning, HttpCogFactory, IndexOutcome, IndexPipeline, IndexReport, IndexRequest,
    SourceFactory,
};
pub use retry::RetryPolicy;
pub use signer::{HttpSigner, PassthroughSigner, UrlSigner};
pub use window::{map_window, output_size};
