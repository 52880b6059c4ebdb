//! End-to-end pipeline runs over in-memory COGs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cog_reader::{
    CogOptions, CogReader, MemoryRangeReader, MetadataWarning, RasterMetadata, RasterSource,
};
use index_processor::{
    BandRole, IndexConfig, IndexError, IndexOutcome, IndexPipeline, IndexRequest, RetryConfig,
    SourceFactory, UrlSigner,
};
use projection::Projector;
use raster_common::{
    BandWindow, CrsCode, GeoBBox, RasterError, RasterResult, Stage, WindowPlan,
};
use test_utils::{assert_approx_eq, create_constant_band, CrsKeys, GeoTiffBuilder};

const SIZE: usize = 64;

type Events = Arc<Mutex<Vec<String>>>;

fn config() -> IndexConfig {
    IndexConfig {
        retry: RetryConfig {
            initial_delay_ms: 1,
            max_attempts: 4,
        },
        ..IndexConfig::default()
    }
}

/// 64x64 pixels of 30 m from (500000, 4000000) in UTM 33N.
fn band_tiff(dn: u16) -> GeoTiffBuilder {
    GeoTiffBuilder::new(SIZE, SIZE)
        .with_u16(create_constant_band(SIZE, SIZE, dn))
        .with_tiles(16, 16)
        .with_geotransform(500000.0, 4000000.0, 30.0, -30.0)
        .with_crs(CrsKeys::Projected(32633))
}

/// Geographic box around the native rectangle, well inside the raster.
fn inner_aoi() -> GeoBBox {
    let to_geographic = Projector::new(CrsCode(32633), CrsCode::WGS84).unwrap();
    let (west, south) = to_geographic.project_point(500300.0, 3998400.0).unwrap();
    let (east, north) = to_geographic.project_point(501500.0, 3999700.0).unwrap();
    GeoBBox::geographic(west, south, east, north).unwrap()
}

fn north_aoi() -> GeoBBox {
    let to_geographic = Projector::new(CrsCode(32633), CrsCode::WGS84).unwrap();
    let (west, south) = to_geographic.project_point(500300.0, 4010000.0).unwrap();
    let (east, north) = to_geographic.project_point(501500.0, 4012000.0).unwrap();
    GeoBBox::geographic(west, south, east, north).unwrap()
}

fn request(aoi: GeoBBox) -> IndexRequest {
    IndexRequest {
        red_href: "red.tif".to_string(),
        nir_href: "nir.tif".to_string(),
        aoi,
    }
}

// ============================================================================
// Test collaborators
// ============================================================================

/// Records each signing call and maps `href` to `mem://href`.
struct RecordingSigner {
    events: Events,
    rate_limited: AtomicU32,
}

impl RecordingSigner {
    fn new(events: Events) -> Self {
        Self::rate_limited(events, 0)
    }

    /// Answers 429 for the first `times` calls.
    fn rate_limited(events: Events, times: u32) -> Self {
        Self {
            events,
            rate_limited: AtomicU32::new(times),
        }
    }
}

#[async_trait]
impl UrlSigner for RecordingSigner {
    async fn sign(&self, href: &str) -> RasterResult<String> {
        self.events.lock().unwrap().push(format!("sign {}", href));
        let remaining = self.rate_limited.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rate_limited.store(remaining - 1, Ordering::SeqCst);
            return Err(RasterError::RateLimited("429 Too Many Requests".into()));
        }
        Ok(format!("mem://{}", href))
    }
}

/// Opens COG bytes registered by URL, recording opens and reads.
struct MemoryFactory {
    files: HashMap<String, Vec<u8>>,
    events: Events,
    failing_reads: Vec<String>,
}

impl MemoryFactory {
    fn new(events: Events, red: Vec<u8>, nir: Vec<u8>) -> Self {
        let mut files = HashMap::new();
        files.insert("mem://red.tif".to_string(), red);
        files.insert("mem://nir.tif".to_string(), nir);
        Self {
            files,
            events,
            failing_reads: Vec::new(),
        }
    }

    /// Make reads of `url` fail with a network error.
    fn fail_reads(mut self, url: &str) -> Self {
        self.failing_reads.push(url.to_string());
        self
    }
}

#[async_trait]
impl SourceFactory for MemoryFactory {
    async fn open(&self, url: &str) -> RasterResult<Box<dyn RasterSource>> {
        self.events.lock().unwrap().push(format!("open {}", url));
        let bytes = self
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| RasterError::Fetch(format!("{} answered 404 Not Found", url)))?;

        let reader = Arc::new(MemoryRangeReader::new(url, bytes));
        let cog = CogReader::open(reader, &CogOptions::default()).await?;
        Ok(Box::new(RecordingSource {
            inner: cog,
            events: self.events.clone(),
            fail: self.failing_reads.iter().any(|u| u == url),
        }))
    }
}

struct RecordingSource {
    inner: CogReader,
    events: Events,
    fail: bool,
}

#[async_trait]
impl RasterSource for RecordingSource {
    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn metadata(&self) -> &RasterMetadata {
        self.inner.metadata()
    }

    async fn read_window(&self, plan: &WindowPlan) -> RasterResult<BandWindow> {
        self.events
            .lock()
            .unwrap()
            .push(format!("read {}", self.identifier()));
        if self.fail {
            return Err(RasterError::Fetch("connection reset by peer".into()));
        }
        self.inner.read_window(plan).await
    }
}

fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

fn recorded(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_computes_ndvi_sequentially() {
    let events = events();
    let factory = MemoryFactory::new(
        events.clone(),
        band_tiff(3000).build(), // 0.2 reflectance
        band_tiff(6000).build(), // 0.5 reflectance
    );
    let pipeline = IndexPipeline::new(RecordingSigner::new(events.clone()), factory, config()).unwrap();

    let outcome = pipeline.run(&request(inner_aoi())).await.unwrap();
    let report = outcome.report().expect("AOI is inside the raster");

    assert_eq!(report.crs, CrsCode(32633));
    assert!(report.warnings.is_empty());
    assert!(report.red_plan.window.fits_within(SIZE, SIZE));
    assert_eq!(report.red_plan, report.nir_plan);
    assert_eq!(report.result.width, report.red_plan.out_width);
    assert_eq!(report.result.height, report.red_plan.out_height);

    for value in &report.result.values {
        assert_approx_eq!(*value, 0.4286, 1e-4);
    }
    assert_eq!(report.result.stats.coverage_pct, 100.0);

    assert_eq!(
        recorded(&events),
        vec![
            "sign red.tif",
            "open mem://red.tif",
            "read mem://red.tif",
            "sign nir.tif",
            "open mem://nir.tif",
            "read mem://nir.tif",
        ]
    );
}

#[tokio::test]
async fn test_aoi_north_of_raster_reads_nothing() {
    let events = events();
    let factory = MemoryFactory::new(events.clone(), band_tiff(3000).build(), band_tiff(6000).build());
    let pipeline = IndexPipeline::new(RecordingSigner::new(events.clone()), factory, config()).unwrap();

    let outcome = pipeline.run(&request(north_aoi())).await.unwrap();

    assert_eq!(outcome, IndexOutcome::EmptyIntersection { band: BandRole::Red });
    let recorded = recorded(&events);
    assert!(recorded.iter().all(|e| !e.starts_with("read")), "{:?}", recorded);
    assert!(recorded.iter().all(|e| !e.contains("nir")), "{:?}", recorded);
}

#[tokio::test]
async fn test_nir_outside_aoi_is_empty_for_nir() {
    let events = events();
    let nir = band_tiff(6000)
        .with_geotransform(700000.0, 4000000.0, 30.0, -30.0)
        .build();
    let factory = MemoryFactory::new(events.clone(), band_tiff(3000).build(), nir);
    let pipeline = IndexPipeline::new(RecordingSigner::new(events.clone()), factory, config()).unwrap();

    let outcome = pipeline.run(&request(inner_aoi())).await.unwrap();

    assert_eq!(outcome, IndexOutcome::EmptyIntersection { band: BandRole::Nir });
    assert!(!recorded(&events).contains(&"read mem://nir.tif".to_string()));
}

#[tokio::test]
async fn test_crs_fallback_reported_per_band() {
    let events = events();
    let factory = MemoryFactory::new(
        events.clone(),
        band_tiff(3000).with_crs(CrsKeys::Missing).build(),
        band_tiff(6000).build(),
    );
    let pipeline = IndexPipeline::new(RecordingSigner::new(events.clone()), factory, config()).unwrap();

    let outcome = pipeline.run(&request(inner_aoi())).await.unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].band, BandRole::Red);
    assert!(matches!(
        report.warnings[0].warning,
        MetadataWarning::CrsFallback { assumed: CrsCode(32633), .. }
    ));
}

#[tokio::test]
async fn test_rate_limited_signing_is_retried() {
    let events = events();
    let factory = MemoryFactory::new(events.clone(), band_tiff(3000).build(), band_tiff(6000).build());
    let signer = RecordingSigner::rate_limited(events.clone(), 2);
    let pipeline = IndexPipeline::new(signer, factory, config()).unwrap();

    let outcome = pipeline.run(&request(inner_aoi())).await.unwrap();
    assert!(outcome.report().is_some());

    let signs: Vec<_> = recorded(&events)
        .into_iter()
        .filter(|e| e.starts_with("sign"))
        .collect();
    assert_eq!(signs, vec!["sign red.tif", "sign red.tif", "sign red.tif", "sign nir.tif"]);
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_four_attempts() {
    let events = events();
    let factory = MemoryFactory::new(events.clone(), band_tiff(3000).build(), band_tiff(6000).build());
    let signer = RecordingSigner::rate_limited(events.clone(), 100);
    let pipeline = IndexPipeline::new(signer, factory, config()).unwrap();

    let err = pipeline.run(&request(inner_aoi())).await.unwrap_err();

    assert_eq!(err.band_role(), Some(BandRole::Red));
    assert!(matches!(
        err,
        IndexError::Band { source: RasterError::RateLimited(_), .. }
    ));
    assert_eq!(recorded(&events).len(), 4);
}

#[tokio::test]
async fn test_fetch_error_not_retried() {
    let events = events();
    let factory = MemoryFactory::new(events.clone(), band_tiff(3000).build(), band_tiff(6000).build())
        .fail_reads("mem://nir.tif");
    let pipeline = IndexPipeline::new(RecordingSigner::new(events.clone()), factory, config()).unwrap();

    let err = pipeline.run(&request(inner_aoi())).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Fetch));
    assert_eq!(err.band_role(), Some(BandRole::Nir));
    assert_eq!(err.to_string(), "nir band: Fetch failed: connection reset by peer");
    let nir_reads = recorded(&events)
        .iter()
        .filter(|e| *e == "read mem://nir.tif")
        .count();
    assert_eq!(nir_reads, 1);
}

#[tokio::test]
async fn test_corrupt_header_is_metadata_error() {
    let events = events();
    let factory = MemoryFactory::new(events.clone(), b"not a tiff at all".to_vec(), band_tiff(6000).build());
    let pipeline = IndexPipeline::new(RecordingSigner::new(events.clone()), factory, config()).unwrap();

    let err = pipeline.run(&request(inner_aoi())).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Metadata));
    assert_eq!(err.band_role(), Some(BandRole::Red));
}

#[test]
fn test_invalid_config_rejected() {
    let events = events();
    let factory = MemoryFactory::new(events.clone(), Vec::new(), Vec::new());
    let bad = IndexConfig {
        max_output_dim: 0,
        ..config()
    };

    let result = IndexPipeline::new(RecordingSigner::new(events), factory, bad);
    assert!(matches!(result, Err(IndexError::Config(_))));
}
