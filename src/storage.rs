use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File-backed key-value sink for canonical series artifacts, keyed by
/// (data type, optional area, date). Area-less artifacts (reserve) land
/// under `system/`. Re-putting the same value is byte-idempotent, and a
/// re-run for the same key supersedes the previous artifact in place.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, data_type: &str, area: Option<&str>, date: &str) -> PathBuf {
        self.root
            .join(area.unwrap_or("system"))
            .join(format!("{data_type}-{date}.json"))
    }

    /// Serialize `value` as pretty-printed JSON under the key. Returns the
    /// written path.
    pub fn put<T: Serialize>(
        &self,
        data_type: &str,
        area: Option<&str>,
        date: &str,
        value: &T,
    ) -> Result<PathBuf> {
        let path = self.path_for(data_type, area, date);
        let dir = path.parent().expect("artifact path always has a parent");
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create artifact directory {dir:?}"))?;

        let mut data = serde_json::to_vec_pretty(value).context("failed to serialize artifact")?;
        data.push(b'\n');
        fs::write(&path, &data)
            .with_context(|| format!("failed to write artifact {path:?}"))?;
        Ok(path)
    }

    pub fn get(&self, data_type: &str, area: Option<&str>, date: &str) -> Result<serde_json::Value> {
        let path = self.path_for(data_type, area, date);
        let raw = fs::read(&path)
            .with_context(|| format!("no artifact stored at {path:?}"))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("artifact {path:?} is not valid JSON"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Area, DemandPoint, DemandSeries, Source};

    fn sample_series() -> DemandSeries {
        let mut series = DemandSeries::new(Area::Tokyo, "2025-10-23");
        series.source = Source {
            name: "TEPCO".to_string(),
            url: "https://www.tepco.co.jp/".to_string(),
        };
        series.series.push(DemandPoint {
            ts: crate::timeutil::hour_timestamp(
                chrono::NaiveDate::from_ymd_opt(2025, 10, 23).unwrap(),
                0,
            ),
            demand_mw: 26654.0,
            forecast_mw: Some(27010.0),
        });
        series
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store
            .put("demand", Some("tokyo"), "2025-10-23", &sample_series())
            .unwrap();
        assert!(path.ends_with("tokyo/demand-2025-10-23.json"));

        let value = store.get("demand", Some("tokyo"), "2025-10-23").unwrap();
        assert_eq!(value["area"], "tokyo");
        assert_eq!(value["series"][0]["demand_mw"], 26654.0);
    }

    #[test]
    fn area_less_artifacts_land_under_system() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store
            .put("reserve", None, "2025-10-23", &serde_json::json!({"date": "2025-10-23"}))
            .unwrap();
        assert!(path.ends_with("system/reserve-2025-10-23.json"));
    }

    #[test]
    fn reput_is_byte_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let series = sample_series();

        let path = store
            .put("demand", Some("tokyo"), "2025-10-23", &series)
            .unwrap();
        let first = std::fs::read(&path).unwrap();
        store
            .put("demand", Some("tokyo"), "2025-10-23", &series)
            .unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn get_missing_key_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.get("demand", Some("tokyo"), "1999-01-01").is_err());
    }
}
