//! The sequential band-fetch pipeline.
//!
//! Upstream providers throttle parallel requests, so the two bands are
//! signed, opened and read strictly one after another inside a single
//! `run` call; there is no API for fetching a band on its own.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cog_reader::{CogOptions, CogReader, HttpRangeReader, MetadataWarning, RangeReader, RasterSource};
use projection::reproject_bbox;
use raster_common::{
    BandWindow, CrsCode, GeoBBox, IndexResult, RasterError, RasterResult, WindowMapping, WindowPlan,
};
use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::catalog::BandRole;
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::ndvi::compute_index;
use crate::retry::RetryPolicy;
use crate::signer::UrlSigner;
use crate::window::map_window;

/// Opens raster sources by URL.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn open(&self, url: &str) -> RasterResult<Box<dyn RasterSource>>;
}

/// Opens COGs over HTTP range requests, sharing one client.
pub struct HttpCogFactory {
    client: Client,
    options: CogOptions,
}

impl HttpCogFactory {
    pub fn new(options: CogOptions) -> RasterResult<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RasterError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, options })
    }
}

#[async_trait]
impl SourceFactory for HttpCogFactory {
    async fn open(&self, url: &str) -> RasterResult<Box<dyn RasterSource>> {
        let reader: Arc<dyn RangeReader> =
            Arc::new(HttpRangeReader::with_client(self.client.clone(), url));
        let cog = CogReader::open(reader, &self.options).await?;
        Ok(Box::new(cog))
    }
}

/// The two band assets and the area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    pub red_href: String,
    pub nir_href: String,
    /// Area of interest, normally geographic.
    pub aoi: GeoBBox,
}

/// A metadata warning together with the band it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandWarning {
    pub band: BandRole,
    pub warning: MetadataWarning,
}

impl fmt::Display for BandWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} band: {}", self.band, self.warning)
    }
}

/// A computed index and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReport {
    pub result: IndexResult,
    pub red_plan: WindowPlan,
    pub nir_plan: WindowPlan,
    /// Native CRS of the red band.
    pub crs: CrsCode,
    pub warnings: Vec<BandWarning>,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    Computed(IndexReport),
    /// The AOI does not overlap `band`; nothing after it was read.
    EmptyIntersection { band: BandRole },
}

impl IndexOutcome {
    pub fn report(&self) -> Option<&IndexReport> {
        match self {
            IndexOutcome::Computed(report) => Some(report),
            IndexOutcome::EmptyIntersection { .. } => None,
        }
    }
}

/// One band read through the pipeline.
enum BandFetch {
    Read {
        window: BandWindow,
        plan: WindowPlan,
        crs: CrsCode,
    },
    Empty,
}

/// Computes the index for a request: sign, open, map and read the red band,
/// then the same for NIR, then combine.
pub struct IndexPipeline {
    signer: Box<dyn UrlSigner>,
    factory: Box<dyn SourceFactory>,
    config: IndexConfig,
    retry: RetryPolicy,
}

impl IndexPipeline {
    pub fn new(
        signer: impl UrlSigner + 'static,
        factory: impl SourceFactory + 'static,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate().map_err(IndexError::Config)?;
        let retry = RetryPolicy::from_config(&config.retry);

        Ok(Self {
            signer: Box::new(signer),
            factory: Box::new(factory),
            config,
            retry,
        })
    }

    /// Pipeline over HTTP COGs.
    pub fn http(signer: impl UrlSigner + 'static, config: IndexConfig) -> Result<Self> {
        let factory = HttpCogFactory::new(config.cog_options())?;
        Self::new(signer, factory, config)
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[instrument(skip(self, request), fields(aoi = ?request.aoi))]
    pub async fn run(&self, request: &IndexRequest) -> Result<IndexOutcome> {
        let mut warnings = Vec::new();

        let (red, red_plan, crs) =
            match self.fetch_band(BandRole::Red, &request.red_href, &request.aoi, &mut warnings).await? {
                BandFetch::Read { window, plan, crs } => (window, plan, crs),
                BandFetch::Empty => return Ok(IndexOutcome::EmptyIntersection { band: BandRole::Red }),
            };

        let (nir, nir_plan) =
            match self.fetch_band(BandRole::Nir, &request.nir_href, &request.aoi, &mut warnings).await? {
                BandFetch::Read { window, plan, .. } => (window, plan),
                BandFetch::Empty => return Ok(IndexOutcome::EmptyIntersection { band: BandRole::Nir }),
            };

        let result = compute_index(
            &red,
            &nir,
            &self.config.calibration(),
            self.config.vegetation_threshold,
        )?;

        info!(
            width = result.width,
            height = result.height,
            mean = result.stats.mean,
            coverage_pct = result.stats.coverage_pct,
            valid = result.stats.valid_count,
            "Computed NDVI"
        );

        Ok(IndexOutcome::Computed(IndexReport {
            result,
            red_plan,
            nir_plan,
            crs,
            warnings,
        }))
    }

    async fn fetch_band(
        &self,
        band: BandRole,
        href: &str,
        aoi: &GeoBBox,
        warnings: &mut Vec<BandWarning>,
    ) -> Result<BandFetch> {
        let tag = |e: RasterError| IndexError::band(band, e);

        let url = self
            .retry
            .run("sign", || self.signer.sign(href))
            .await
            .map_err(tag)?;

        let source = self
            .retry
            .run("open", || self.factory.open(&url))
            .await
            .map_err(tag)?;

        let metadata = source.metadata();
        for warning in &metadata.warnings {
            warn!(band = %band, source = source.identifier(), "{}", warning);
            warnings.push(BandWarning {
                band,
                warning: warning.clone(),
            });
        }

        let crs = metadata.crs();
        let native = reproject_bbox(aoi, crs).map_err(tag)?;
        let mapping = map_window(
            &metadata.geo_transform,
            &native,
            metadata.width,
            metadata.height,
            self.config.max_output_dim,
        )
        .map_err(tag)?;

        let plan = match mapping {
            WindowMapping::Window(plan) => plan,
            WindowMapping::EmptyIntersection => {
                info!(band = %band, source = source.identifier(), "AOI outside raster");
                return Ok(BandFetch::Empty);
            }
        };

        let window = self
            .retry
            .run("read", || source.read_window(&plan))
            .await
            .map_err(tag)?;

        info!(
            band = %band,
            col0 = plan.window.col0,
            row0 = plan.window.row0,
            width = plan.window.width(),
            height = plan.window.height(),
            out_width = plan.out_width,
            out_height = plan.out_height,
            "Read band window"
        );

        Ok(BandFetch::Read { window, plan, crs })
    }
}
