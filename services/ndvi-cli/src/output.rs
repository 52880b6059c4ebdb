//! Writing rendered images and statistics.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use index_processor::IndexReport;
use raster_common::{IndexStats, WindowPlan};
use renderer::{ColorRaster, Palette};
use serde::Serialize;

/// Statistics file contents.
#[derive(Debug, Serialize)]
pub struct StatsReport<'a> {
    pub red_href: &'a str,
    pub nir_href: &'a str,
    pub crs: String,
    pub palette: Palette,
    pub width: usize,
    pub height: usize,
    pub red_window: WindowPlan,
    pub nir_window: WindowPlan,
    pub stats: IndexStats,
    pub warnings: Vec<String>,
}

impl<'a> StatsReport<'a> {
    pub fn new(report: &IndexReport, red_href: &'a str, nir_href: &'a str, palette: Palette) -> Self {
        Self {
            red_href,
            nir_href,
            crs: report.crs.to_string(),
            palette,
            width: report.result.width,
            height: report.result.height,
            red_window: report.red_plan,
            nir_window: report.nir_plan,
            stats: report.result.stats,
            warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }
}

/// One-line human summary of a computed index.
pub fn summary_line(report: &IndexReport) -> String {
    let stats = &report.result.stats;
    format!(
        "NDVI {}x{} ({}): min {:.4}, mean {:.4}, max {:.4}, vegetation {:.1}% of {} valid pixels",
        report.result.width,
        report.result.height,
        report.crs,
        stats.min,
        stats.mean,
        stats.max,
        stats.coverage_pct,
        stats.valid_count
    )
}

pub async fn write_png(raster: &ColorRaster, path: &Path) -> Result<()> {
    let png = raster
        .to_png()
        .map_err(|e| anyhow!("Failed to encode PNG: {}", e))?;
    tokio::fs::write(path, png)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub async fn write_stats(stats: &StatsReport<'_>, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(stats).context("Failed to serialize statistics")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use index_processor::BandWarning;
    use raster_common::{CrsCode, IndexResult, PixelWindow};

    fn report() -> IndexReport {
        let plan = WindowPlan {
            window: PixelWindow::new(100, 100, 200, 200),
            out_width: 2,
            out_height: 1,
        };
        IndexReport {
            result: IndexResult {
                values: vec![0.5, f32::NAN],
                width: 2,
                height: 1,
                stats: IndexStats {
                    min: 0.5,
                    mean: 0.5,
                    max: 0.5,
                    coverage_pct: 100.0,
                    valid_count: 1,
                    total_count: 2,
                },
            },
            red_plan: plan,
            nir_plan: plan,
            crs: CrsCode(32633),
            warnings: Vec::<BandWarning>::new(),
        }
    }

    #[test]
    fn test_summary_line() {
        let line = summary_line(&report());
        assert_eq!(
            line,
            "NDVI 2x1 (EPSG:32633): min 0.5000, mean 0.5000, max 0.5000, vegetation 100.0% of 1 valid pixels"
        );
    }

    #[tokio::test]
    async fn test_write_stats_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let report = report();
        let stats = StatsReport::new(&report, "red.tif", "nir.tif", Palette::Viridis);

        write_stats(&stats, &path).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["crs"], "EPSG:32633");
        assert_eq!(value["palette"], "viridis");
        assert_eq!(value["red_window"]["window"]["col0"], 100);
        assert_eq!(value["stats"]["valid_count"], 1);
        assert_eq!(value["stats"]["coverage_pct"], 100.0);
    }

    #[tokio::test]
    async fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndvi.png");
        let raster = renderer::render_index(&report().result, Palette::RdYlGn);

        write_png(&raster, &path).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
