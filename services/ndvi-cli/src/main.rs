//! NDVI command-line tool.
//!
//! Computes the normalized difference vegetation index over an area of
//! interest from two remote Cloud-Optimized GeoTIFF bands:
//! - Reads only the header and the tiles covering the AOI (HTTP Range)
//! - Reprojects the lon/lat AOI into each raster's native CRS
//! - Retries rate-limited requests with exponential backoff
//! - Writes a colorized PNG, an optional legend and optional statistics

mod item;
mod output;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use index_processor::{HttpSigner, IndexConfig, IndexOutcome, IndexPipeline, IndexRequest, PassthroughSigner};
use raster_common::{CrsCode, GeoBBox};
use renderer::{render_index, render_legend, Palette};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use item::{BandHrefs, StacItem};
use output::{summary_line, write_png, write_stats, StatsReport};

#[derive(Parser, Debug)]
#[command(name = "ndvi")]
#[command(about = "Compute NDVI for an area of interest from remote COG bands")]
struct Args {
    /// Red band COG URL
    #[arg(long, env = "NDVI_RED_URL", requires = "nir_url", conflicts_with = "item")]
    red_url: Option<String>,

    /// Near-infrared band COG URL
    #[arg(long, env = "NDVI_NIR_URL", requires = "red_url", conflicts_with = "item")]
    nir_url: Option<String>,

    /// STAC item JSON file; band assets are picked by key
    #[arg(long)]
    item: Option<PathBuf>,

    /// Area of interest in WGS84: west,south,east,north
    #[arg(long, allow_hyphen_values = true)]
    bbox: String,

    /// Color palette (rdylgn, viridis, greens, magma, grayscale)
    #[arg(long, default_value = "rdylgn")]
    palette: String,

    /// Output PNG path
    #[arg(short, long, default_value = "ndvi.png")]
    output: PathBuf,

    /// Legend PNG path
    #[arg(long)]
    legend: Option<PathBuf>,

    /// Legend size in pixels
    #[arg(long, default_value = "256")]
    legend_width: usize,

    #[arg(long, default_value = "16")]
    legend_height: usize,

    /// Statistics JSON path
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Token endpoint used to sign asset hrefs (GET ?href=...)
    #[arg(long, env = "NDVI_SIGN_ENDPOINT")]
    sign_endpoint: Option<String>,

    /// Largest output width or height (overrides NDVI_MAX_OUTPUT_DIM)
    #[arg(long)]
    max_dim: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let palette = Palette::parse(&args.palette).unwrap_or_else(|| {
        warn!(palette = %args.palette, default = %Palette::default(), "Unknown palette, using default");
        Palette::default()
    });

    let mut config = IndexConfig::from_env();
    if let Some(max_dim) = args.max_dim {
        config.max_output_dim = max_dim;
    }

    let aoi = GeoBBox::from_bbox_string(&args.bbox, CrsCode::WGS84).context("Invalid --bbox")?;
    let hrefs = band_hrefs(&args).await?;
    info!(red = %hrefs.red, nir = %hrefs.nir, ?aoi, "Computing NDVI");

    let pipeline = match &args.sign_endpoint {
        Some(endpoint) => IndexPipeline::http(HttpSigner::new(endpoint.as_str())?, config)?,
        None => IndexPipeline::http(PassthroughSigner, config)?,
    };

    let request = IndexRequest {
        red_href: hrefs.red.clone(),
        nir_href: hrefs.nir.clone(),
        aoi,
    };

    let report = match pipeline.run(&request).await.context("NDVI computation failed")? {
        IndexOutcome::Computed(report) => report,
        IndexOutcome::EmptyIntersection { band } => {
            println!(
                "The area of interest does not overlap the {} band raster; try a different area or scene.",
                band
            );
            return Ok(());
        }
    };

    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }

    let raster = render_index(&report.result, palette);
    write_png(&raster, &args.output).await?;
    info!(path = %args.output.display(), "Wrote NDVI image");

    if let Some(path) = &args.legend {
        let legend = render_legend(palette, args.legend_width, args.legend_height);
        write_png(&legend, path).await?;
        info!(path = %path.display(), "Wrote legend");
    }

    if let Some(path) = &args.stats {
        let stats = StatsReport::new(&report, &hrefs.red, &hrefs.nir, palette);
        write_stats(&stats, path).await?;
        info!(path = %path.display(), "Wrote statistics");
    }

    println!("{}", summary_line(&report));
    Ok(())
}

async fn band_hrefs(args: &Args) -> Result<BandHrefs> {
    if let Some(path) = &args.item {
        return StacItem::load(path).await?.band_hrefs();
    }

    match (&args.red_url, &args.nir_url) {
        (Some(red), Some(nir)) => Ok(BandHrefs {
            red: red.clone(),
            nir: nir.clone(),
        }),
        _ => bail!("Provide either --item or both --red-url and --nir-url"),
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
