use encoding_rs::SHIFT_JIS;
use std::io::Read;

use crate::columns::{ColumnSpec, Pattern};
use crate::error::ParseError;
use crate::models::{Area, DemandSeries, Source};
use crate::utility_demand::{parse_utility_demand, UtilityDemandFormat};

/// Tokyo Electric Power Company hourly demand feed.
///
/// The download CSV is Shift_JIS encoded, prepends a free-text banner
/// before the header, reports demand in 万kW (10 MW units) and interleaves
/// 5-minute rows and redundant hourly blocks.
pub struct TepcoAdapter {
    source_url: String,
}

const TEPCO_FORMAT: UtilityDemandFormat = UtilityDemandFormat {
    anchor: &["date", "日付"],
    columns: &[
        ColumnSpec {
            name: "date",
            patterns: &[Pattern::Contains("date"), Pattern::Exact("日付")],
        },
        ColumnSpec {
            name: "time",
            patterns: &[Pattern::Contains("time"), Pattern::Exact("時刻")],
        },
        ColumnSpec {
            name: "actual",
            patterns: &[Pattern::Contains("実績"), Pattern::Contains("actual")],
        },
        ColumnSpec {
            name: "forecast",
            patterns: &[
                Pattern::Contains("予測"),
                Pattern::Contains("予想"),
                Pattern::Contains("forecast"),
            ],
        },
    ],
    scale: 10.0,
};

impl TepcoAdapter {
    pub fn new() -> Self {
        Self {
            source_url: "https://www.tepco.co.jp/forecast/html/download-j.html".to_string(),
        }
    }

    pub fn parse_csv(
        &self,
        mut reader: impl Read,
        date: &str,
    ) -> Result<DemandSeries, ParseError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;

        let (text, _, had_errors) = SHIFT_JIS.decode(&raw);
        if had_errors {
            return Err(ParseError::Encoding {
                encoding: "Shift_JIS",
            });
        }

        parse_utility_demand(
            &text,
            date,
            Area::Tokyo,
            &TEPCO_FORMAT,
            Source {
                name: "TEPCO".to_string(),
                url: self.source_url.clone(),
            },
        )
    }
}

impl Default for TepcoAdapter {
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
            "/testdata/tepco-sample.csv"
        ))
        .unwrap()
    }

    #[test]
    fn parses_shift_jis_fixture_into_full_day() {
        let adapter = TepcoAdapter::new();
        let series = adapter.parse_csv(fixture().as_slice(), "2025-11-01").unwrap();

        assert_eq!(series.area, Area::Tokyo);
        assert_eq!(series.date, "2025-11-01");
        assert_eq!(series.series.len(), 24);
        // 万kW × 10 → MW
        assert!((series.series[0].demand_mw - 26654.0).abs() < 1e-9);
        assert!((series.series[0].forecast_mw.unwrap() - 27010.0).abs() < 1e-9);
        assert_eq!(series.source.name, "TEPCO");
        // Full day with forecast present: no warning.
        assert!(series.meta.is_none());
    }

    #[test]
    fn timestamps_are_strictly_increasing_and_hour_aligned() {
        let adapter = TepcoAdapter::new();
        let series = adapter.parse_csv(fixture().as_slice(), "2025-11-01").unwrap();

        for window in series.series.windows(2) {
            assert!(window[0].ts < window[1].ts);
        }
        for point in &series.series {
            assert_eq!(point.ts.format("%Y-%m-%d").to_string(), "2025-11-01");
            assert_eq!(point.ts.format("%M:%S").to_string(), "00:00");
            assert_eq!(point.ts.format("%:z").to_string(), "+09:00");
        }
    }

    #[test]
    fn duplicate_hour_blocks_keep_first_occurrence() {
        // The fixture repeats hour 0 in a trailing block with a sentinel
        // value; the first block's value must survive.
        let adapter = TepcoAdapter::new();
        let series = adapter.parse_csv(fixture().as_slice(), "2025-11-01").unwrap();
        assert!((series.series[0].demand_mw - 26654.0).abs() < 1e-9);
    }

    #[test]
    fn unpadded_row_dates_match_padded_request() {
        // Fixture rows carry "2025/11/1"; the request is "2025-11-01".
        let adapter = TepcoAdapter::new();
        assert!(adapter.parse_csv(fixture().as_slice(), "2025-11-01").is_ok());
    }

    #[test]
    fn partial_day_attaches_hour_count_warning() {
        let adapter = TepcoAdapter::new();
        let series = adapter.parse_csv(fixture().as_slice(), "2025-11-02").unwrap();

        assert_eq!(series.series.len(), 2);
        let warning = series.meta.unwrap().warning.unwrap();
        assert!(warning.contains("Data for 2 hours available (expected 24)"));
        // The 11/2 rows carry no forecast values.
        assert!(warning.contains("Forecast data not available"));
    }

    #[test]
    fn missing_date_yields_no_data_error() {
        let adapter = TepcoAdapter::new();
        let err = adapter
            .parse_csv(fixture().as_slice(), "2025-12-01")
            .unwrap_err();
        assert!(matches!(err, ParseError::NoData { .. }));
    }

    #[test]
    fn missing_required_columns_is_fatal() {
        let csv = "DATE,TIME,volume\n2025-11-01,0:00,100\n";
        let adapter = TepcoAdapter::new();
        let err = adapter.parse_csv(csv.as_bytes(), "2025-11-01").unwrap_err();
        match err {
            ParseError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["actual"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_anchor_not_found_is_fatal() {
        let csv = "updated at 06:05\nno,header,here\n";
        let adapter = TepcoAdapter::new();
        let err = adapter.parse_csv(csv.as_bytes(), "2025-11-01").unwrap_err();
        assert!(matches!(err, ParseError::HeaderNotFound { .. }));
    }

    #[test]
    fn invalid_time_format_is_fatal() {
        let csv = "DATE,TIME,Actual\n2025-11-01,midnight,2665.4\n";
        let adapter = TepcoAdapter::new();
        let err = adapter.parse_csv(csv.as_bytes(), "2025-11-01").unwrap_err();
        assert!(matches!(err, ParseError::InvalidTime { .. }));
    }

    #[test]
    fn invalid_actual_value_is_fatal_for_single_area_feed() {
        let csv = "DATE,TIME,Actual\n2025-11-01,0:00,n/a\n";
        let adapter = TepcoAdapter::new();
        let err = adapter.parse_csv(csv.as_bytes(), "2025-11-01").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidValue {
                column: "actual",
                ..
            }
        ));
    }

    #[test]
    fn parse_is_idempotent() {
        let adapter = TepcoAdapter::new();
        let a = adapter.parse_csv(fixture().as_slice(), "2025-11-01").unwrap();
        let b = adapter.parse_csv(fixture().as_slice(), "2025-11-01").unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
