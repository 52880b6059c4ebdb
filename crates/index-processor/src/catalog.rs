//! Finding the red and near-infrared assets among catalog item keys.
//!
//! Providers name band assets inconsistently (`red`/`nir` on Earth Search,
//! `B04`/`B08` on Planetary Computer, `SR_B4`/`SR_B5` for Landsat), so keys
//! are matched against ordered preference lists.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Red asset keys, most preferred first.
pub const RED_KEYS: &[&str] = &["red", "B04", "SR_B4", "B4"];

/// Near-infrared asset keys, most preferred first.
pub const NIR_KEYS: &[&str] = &["nir", "nir08", "B08", "B8A", "SR_B5", "B8", "B5"];

/// Which of the two bands a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandRole {
    Red,
    Nir,
}

impl fmt::Display for BandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandRole::Red => write!(f, "red"),
            BandRole::Nir => write!(f, "nir"),
        }
    }
}

/// Resolved asset keys, as spelled in the catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandKeys {
    pub red: String,
    pub nir: String,
}

/// Resolve band keys using the default preference lists.
pub fn resolve_band_keys<I, S>(keys: I) -> Result<BandKeys>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    resolve_band_keys_with(keys, RED_KEYS, NIR_KEYS)
}

/// Resolve band keys against explicit preference lists.
///
/// Matching is case-insensitive; when several keys differ only in case the
/// lexicographically first wins. Red is resolved first. If the NIR pick is
/// the same key as the red pick, NIR moves on to its next candidate.
pub fn resolve_band_keys_with<I, S>(keys: I, red_prefs: &[&str], nir_prefs: &[&str]) -> Result<BandKeys>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let keys: BTreeSet<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();

    let red = candidates(&keys, red_prefs).next().ok_or_else(|| {
        IndexError::AmbiguousBands(format!("no red asset among {}", describe(&keys)))
    })?;

    let nir = candidates(&keys, nir_prefs)
        .find(|key| *key != red)
        .ok_or_else(|| {
            IndexError::AmbiguousBands(format!(
                "no near-infrared asset distinct from '{}' among {}",
                red,
                describe(&keys)
            ))
        })?;

    Ok(BandKeys {
        red: red.to_string(),
        nir: nir.to_string(),
    })
}

/// Keys matching the preferences, in preference order.
fn candidates<'a>(
    keys: &'a BTreeSet<String>,
    prefs: &'a [&'a str],
) -> impl Iterator<Item = &'a str> + 'a {
    prefs.iter().filter_map(move |pref| {
        keys.iter()
            .find(|key| key.eq_ignore_ascii_case(pref))
            .map(String::as_str)
    })
}

fn describe(keys: &BTreeSet<String>) -> String {
    if keys.is_empty() {
        return "no assets".to_string();
    }
    keys.iter().cloned().collect::<Vec<_>>().join(", ")
}
