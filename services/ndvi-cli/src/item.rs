//! STAC item files: locating the red and NIR band assets.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use index_processor::resolve_band_keys;
use serde::Deserialize;

/// The parts of a STAC item the CLI needs.
#[derive(Debug, Clone, Deserialize)]
pub struct StacItem {
    #[serde(default)]
    pub id: String,
    pub assets: BTreeMap<String, StacAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacAsset {
    pub href: String,
}

/// Asset hrefs for the two bands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandHrefs {
    pub red: String,
    pub nir: String,
}

impl StacItem {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse STAC item")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read STAC item {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Resolve the red and NIR asset hrefs by asset key.
    pub fn band_hrefs(&self) -> Result<BandHrefs> {
        let keys = resolve_band_keys(self.assets.keys())
            .with_context(|| format!("STAC item '{}'", self.id))?;

        // Keys come from the map, so both lookups succeed
        let href = |key: &str| {
            self.assets
                .get(key)
                .map(|asset| asset.href.clone())
                .with_context(|| format!("asset '{}' disappeared", key))
        };

        Ok(BandHrefs {
            red: href(&keys.red)?,
            nir: href(&keys.nir)?,
        })
    }
}
