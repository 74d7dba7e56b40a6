use chrono::NaiveDate;

use crate::models::Area;

/// One upstream feed: display name plus base URL, overridable through the
/// environment for mirrors and test servers.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub name: &'static str,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Sources {
    pub tepco: SourceConfig,
    pub kansai: SourceConfig,
    pub occto: SourceConfig,
    pub jepx: SourceConfig,
}

impl Sources {
    /// Environment overrides: TEPCO_URL, KANSAI_URL, OCCTO_URL, JEPX_URL.
    pub fn from_env() -> Self {
        Self {
            tepco: SourceConfig {
                name: "TEPCO",
                url: env_or(
                    "TEPCO_URL",
                    "https://www.tepco.co.jp/forecast/html/download-j.html",
                ),
            },
            kansai: SourceConfig {
                name: "Kansai Electric",
                url: env_or(
                    "KANSAI_URL",
                    "https://www.kansai-td.co.jp/denkiyoho/download.html",
                ),
            },
            occto: SourceConfig {
                name: "OCCTO",
                url: env_or("OCCTO_URL", "https://web-kohyo.occto.or.jp"),
            },
            jepx: SourceConfig {
                name: "JEPX",
                url: env_or("JEPX_URL", "https://www.jepx.jp"),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

/// JEPX publishes one spot CSV per delivery date.
pub fn jepx_spot_url(base: &str, date: NaiveDate) -> String {
    format!(
        "{}/market/excel/spot_{}.csv",
        base.trim_end_matches('/'),
        date.format("%Y%m%d")
    )
}

/// OCCTO download products this pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcctoFeed {
    /// jhSybt=02: area demand / capacity / reserve.
    Reserve,
    /// jhSybt=03: supply by fuel category.
    GenerationMix,
}

pub fn occto_csv_url(base: &str, feed: OcctoFeed, date: NaiveDate) -> String {
    let kind = match feed {
        OcctoFeed::Reserve => "02",
        OcctoFeed::GenerationMix => "03",
    };
    let day = date.format("%Y/%m/%d");
    format!(
        "{}/kks-web-public/download/downloadCsv?jhSybt={}&tgtYmdFrom={}&tgtYmdTo={}",
        base.trim_end_matches('/'),
        kind,
        day,
        day
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Http,
    Fixture,
}

/// Which parser handles a demand request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandAdapterKind {
    Tepco,
    Kansai,
    /// Kansai Electric's download needs a browser session over HTTP, so
    /// live kansai demand comes from the OCCTO area feed instead.
    OcctoArea,
}

/// Explicit adapter-selection policy keyed by (mode, area). Extending the
/// pipeline to a new area means adding a row here, not branching at call
/// sites.
pub fn demand_adapter_for(mode: FetchMode, area: Area) -> DemandAdapterKind {
    match (mode, area) {
        (FetchMode::Http, Area::Tokyo) => DemandAdapterKind::Tepco,
        (FetchMode::Http, Area::Kansai) => DemandAdapterKind::OcctoArea,
        (FetchMode::Fixture, Area::Tokyo) => DemandAdapterKind::Tepco,
        (FetchMode::Fixture, Area::Kansai) => DemandAdapterKind::Kansai,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jepx_spot_url_embeds_compact_date() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        assert_eq!(
            jepx_spot_url("https://www.jepx.jp", date),
            "https://www.jepx.jp/market/excel/spot_20251101.csv"
        );
        // Trailing slash on the base must not double up.
        assert_eq!(
            jepx_spot_url("https://www.jepx.jp/", date),
            "https://www.jepx.jp/market/excel/spot_20251101.csv"
        );
    }

    #[test]
    fn occto_url_selects_feed_kind() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let url = occto_csv_url("https://web-kohyo.occto.or.jp", OcctoFeed::Reserve, date);
        assert!(url.contains("jhSybt=02"));
        assert!(url.contains("tgtYmdFrom=2025/11/03"));
        assert!(url.contains("tgtYmdTo=2025/11/03"));

        let url = occto_csv_url(
            "https://web-kohyo.occto.or.jp",
            OcctoFeed::GenerationMix,
            date,
        );
        assert!(url.contains("jhSybt=03"));
    }

    #[test]
    fn live_kansai_demand_routes_through_occto() {
        assert_eq!(
            demand_adapter_for(FetchMode::Http, Area::Kansai),
            DemandAdapterKind::OcctoArea
        );
        assert_eq!(
            demand_adapter_for(FetchMode::Fixture, Area::Kansai),
            DemandAdapterKind::Kansai
        );
        assert_eq!(
            demand_adapter_for(FetchMode::Http, Area::Tokyo),
            DemandAdapterKind::Tepco
        );
    }
}
