use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{PricePoint, PriceSource, ProfilePoint};

/// The subset of a stored spot-price artifact this crate consumes.
#[derive(Debug, Deserialize)]
struct SpotArtifact {
    price_yen_per_kwh: Vec<PricePoint>,
    source: PriceSource,
}

/// Reads the pipeline's JSON artifacts: spot prices from the artifact
/// store layout (`{root}/{area}/spot-{date}.json`) and consumption
/// profiles from standalone files.
pub struct DataLoader {
    prices_root: PathBuf,
}

impl DataLoader {
    pub fn new(prices_root: impl Into<PathBuf>) -> Self {
        Self {
            prices_root: prices_root.into(),
        }
    }

    pub fn load_prices(&self, area: &str, date: &str) -> Result<(Vec<PricePoint>, PriceSource)> {
        let path = self
            .prices_root
            .join(area)
            .join(format!("spot-{date}.json"));
        let raw = std::fs::read(&path).with_context(|| {
            format!("no spot price artifact at {path:?}; run fetch-prices for this date first")
        })?;
        let artifact: SpotArtifact = serde_json::from_slice(&raw)
            .with_context(|| format!("spot price artifact {path:?} has an unexpected shape"))?;
        Ok((artifact.price_yen_per_kwh, artifact.source))
    }

    pub fn load_profile(path: &Path) -> Result<Vec<ProfilePoint>> {
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read profile {path:?}"))?;
        let profile: Vec<ProfilePoint> = serde_json::from_slice(&raw)
            .with_context(|| format!("profile {path:?} must be a JSON array of {{ts, kwh}}"))?;
        Ok(profile)
    }
}
