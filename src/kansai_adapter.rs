use std::io::Read;

use crate::columns::{ColumnSpec, Pattern};
use crate::error::ParseError;
use crate::models::{Area, DemandSeries, Source};
use crate::utility_demand::{parse_utility_demand, UtilityDemandFormat};

/// Kansai Electric hourly demand feed. Same overall shape as the TEPCO
/// download (banner, 万kW units, optional forecast) but UTF-8 encoded and
/// with Japanese-only headers.
pub struct KansaiAdapter {
    source_url: String,
}

const KANSAI_FORMAT: UtilityDemandFormat = UtilityDemandFormat {
    anchor: &["日付", "date"],
    columns: &[
        ColumnSpec {
            name: "date",
            patterns: &[Pattern::Exact("日付"), Pattern::Contains("date")],
        },
        ColumnSpec {
            name: "time",
            patterns: &[Pattern::Exact("時刻"), Pattern::Contains("time")],
        },
        ColumnSpec {
            name: "actual",
            patterns: &[Pattern::Contains("実績"), Pattern::Contains("actual")],
        },
        ColumnSpec {
            name: "forecast",
            patterns: &[
                Pattern::Contains("予想"),
                Pattern::Contains("予測"),
                Pattern::Contains("forecast"),
            ],
        },
    ],
    scale: 10.0,
};

impl KansaiAdapter {
    pub fn new() -> Self {
        Self {
            source_url: "https://www.kansai-td.co.jp/denkiyoho/download.html".to_string(),
        }
    }

    pub fn parse_csv(
        &self,
        mut reader: impl Read,
        date: &str,
    ) -> Result<DemandSeries, ParseError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let text = String::from_utf8(raw).map_err(|_| ParseError::Encoding {
            encoding: "UTF-8",
        })?;

        parse_utility_demand(
            &text,
            date,
            Area::Kansai,
            &KANSAI_FORMAT,
            Source {
                name: "Kansai Electric".to_string(),
                url: self.source_url.clone(),
            },
        )
    }
}

impl Default for KansaiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Vec<u8> {
        std::fs::read(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/testdata/kansai-sample.csv"
        ))
        .unwrap()
    }

    #[test]
    fn parses_japanese_headers() {
        let adapter = KansaiAdapter::new();
        let series = adapter.parse_csv(fixture().as_slice(), "2025-11-01").unwrap();

        assert_eq!(series.area, Area::Kansai);
        assert_eq!(series.series.len(), 24);
        assert_eq!(series.source.name, "Kansai Electric");
        assert!((series.series[0].demand_mw - 15234.0).abs() < 1e-9);
    }

    #[test]
    fn thirty_minute_rows_are_not_hourly_samples() {
        // The Kansai fixture interleaves :30 rows; only :00 rows count.
        let adapter = KansaiAdapter::new();
        let series = adapter.parse_csv(fixture().as_slice(), "2025-11-01").unwrap();
        assert_eq!(series.series.len(), 24);
        for point in &series.series {
            assert_eq!(point.ts.format("%M").to_string(), "00");
        }
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let adapter = KansaiAdapter::new();
        let err = adapter
            .parse_csv(&[0x93u8, 0xfa, 0x95, 0x74][..], "2025-11-01")
            .unwrap_err();
        assert!(matches!(err, ParseError::Encoding { encoding: "UTF-8" }));
    }
}
