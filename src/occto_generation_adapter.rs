use std::collections::BTreeMap;
use std::io::Read;

use crate::columns::{detect_columns, line_of, read_record, ColumnSpec, Pattern};
use crate::error::ParseError;
use crate::generation_estimator::EstimatorParams;
use crate::models::{Area, GenerationMeta, GenerationPoint, GenerationSeries, Source};
use crate::occto_adapter::{csv_reader, find_header, normalize_area};
use crate::timeutil;

/// OCCTO per-fuel supply feed (the jhSybt=03 download). Same banner and
/// 30-minute cadence as the reserve feed, with one megawatt column per fuel
/// category. The feed reports thermal as a single aggregate, which is split
/// into LNG/coal/other with the same fossil fractions the estimator uses.
pub struct OcctoGenerationAdapter {
    source_url: String,
}

const GENERATION_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "date",
        patterns: &[Pattern::Contains("対象年月日"), Pattern::Contains("date")],
    },
    ColumnSpec {
        name: "time",
        patterns: &[Pattern::Exact("時刻"), Pattern::Exact("対象時刻")],
    },
    ColumnSpec {
        name: "area",
        patterns: &[Pattern::Exact("エリア名"), Pattern::Contains("area")],
    },
    ColumnSpec {
        name: "solar",
        patterns: &[Pattern::Contains("太陽光"), Pattern::Contains("solar")],
    },
    ColumnSpec {
        name: "wind",
        patterns: &[Pattern::Contains("風力"), Pattern::Contains("wind")],
    },
    // 水力 must not claim 揚水 (pumped storage) if both appear; 水力 is
    // listed first in the feed so Contains stays unambiguous there.
    ColumnSpec {
        name: "hydro",
        patterns: &[Pattern::Contains("水力"), Pattern::Contains("hydro")],
    },
    ColumnSpec {
        name: "nuclear",
        patterns: &[Pattern::Contains("原子力"), Pattern::Contains("nuclear")],
    },
    ColumnSpec {
        name: "thermal",
        patterns: &[Pattern::Contains("火力"), Pattern::Contains("thermal")],
    },
    ColumnSpec {
        name: "other",
        patterns: &[Pattern::Contains("その他"), Pattern::Contains("other")],
    },
    ColumnSpec {
        name: "total",
        patterns: &[Pattern::Contains("合計"), Pattern::Contains("total")],
    },
];

#[derive(Default, Clone, Copy)]
struct FuelSums {
    solar: f64,
    wind: f64,
    hydro: f64,
    nuclear: f64,
    thermal: f64,
    other: f64,
    total: f64,
    count: u32,
}

impl OcctoGenerationAdapter {
    pub fn new() -> Self {
        Self {
            source_url: "https://web-kohyo.occto.or.jp/".to_string(),
        }
    }

    pub fn parse_csv(
        &self,
        reader: impl Read,
        date: &str,
        target_area: Area,
    ) -> Result<GenerationSeries, ParseError> {
        let target = timeutil::normalize_date(date)
            .ok_or_else(|| ParseError::InvalidDate(date.to_string()))?;
        let base_date = timeutil::parse_date(&target)?;

        let mut csv_reader = csv_reader(reader);
        let mut records = csv_reader.records();
        let header = find_header(&mut records)?;

        let cols = detect_columns(&header, GENERATION_COLUMNS);
        cols.require(
            &["date", "time", "area", "solar", "wind", "hydro", "nuclear", "thermal"],
            &header,
        )?;
        let date_idx = cols.get("date").unwrap();
        let time_idx = cols.get("time").unwrap();
        let area_idx = cols.get("area").unwrap();
        let fuel_idx = |name: &str| cols.get(name);

        let mut buckets: BTreeMap<u32, FuelSums> = BTreeMap::new();

        for record in records {
            let record = read_record(record)?;
            let line = line_of(&record);

            let row_date = record.get(date_idx).unwrap_or("");
            if timeutil::normalize_date(row_date).as_deref() != Some(target.as_str()) {
                continue;
            }

            let area = normalize_area(record.get(area_idx).unwrap_or(""));
            if area != target_area.as_str() {
                continue;
            }

            let row_time = record.get(time_idx).unwrap_or("");
            let (hour, _minute) = timeutil::parse_clock(row_time).ok_or_else(|| {
                ParseError::InvalidTime {
                    line,
                    value: row_time.to_string(),
                }
            })?;

            let cell = |name: &str| -> Option<f64> {
                fuel_idx(name)
                    .and_then(|idx| record.get(idx))
                    .and_then(|c| c.parse().ok())
            };

            // Multi-area aggregate feed: a row with malformed core fuel
            // cells loses the sample rather than the parse.
            let (solar, wind, hydro, nuclear, thermal) = match (
                cell("solar"),
                cell("wind"),
                cell("hydro"),
                cell("nuclear"),
                cell("thermal"),
            ) {
                (Some(s), Some(w), Some(h), Some(n), Some(t)) => (s, w, h, n, t),
                _ => continue,
            };
            let other = cell("other").unwrap_or(0.0);
            let total = cell("total")
                .unwrap_or(solar + wind + hydro + nuclear + thermal + other);

            let entry = buckets.entry(hour).or_default();
            entry.solar += solar;
            entry.wind += wind;
            entry.hydro += hydro;
            entry.nuclear += nuclear;
            entry.thermal += thermal;
            entry.other += other;
            entry.total += total;
            entry.count += 1;
        }

        if buckets.is_empty() {
            return Err(ParseError::NoData { date: target });
        }

        let params = EstimatorParams::default();
        let mut series = GenerationSeries::new(target_area, &target);
        series.source = Source {
            name: "OCCTO".to_string(),
            url: self.source_url.clone(),
        };

        for (hour, sums) in buckets {
            let n = sums.count as f64;
            let thermal = sums.thermal / n;
            series.series.push(GenerationPoint {
                ts: timeutil::hour_timestamp(base_date, hour),
                solar_mw: sums.solar / n,
                wind_mw: sums.wind / n,
                hydro_mw: sums.hydro / n,
                nuclear_mw: sums.nuclear / n,
                lng_mw: thermal * params.lng_split,
                coal_mw: thermal * params.coal_split,
                other_mw: thermal * params.other_split + sums.other / n,
                total_mw: sums.total / n,
            });
        }

        if series.series.len() < 24 {
            series.meta = Some(GenerationMeta {
                warning: Some(format!(
                    "Data for {} hours available (expected 24)",
                    series.series.len()
                )),
                ..Default::default()
            });
        }
        series.recompute_meta(&params.emission);

        Ok(series)
    }
}

impl Default for OcctoGenerationAdapter {
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
            "/testdata/occto-generation-sample.csv"
        ))
        .unwrap()
    }

    #[test]
    fn parses_fuel_columns_into_hourly_series() {
        let adapter = OcctoGenerationAdapter::new();
        let series = adapter
            .parse_csv(fixture().as_slice(), "2025-11-03", Area::Tokyo)
            .unwrap();

        assert_eq!(series.series.len(), 24);
        let noon = &series.series[12];
        // Hour 12 fixture samples: solar 2000/2200, thermal 1400/1600.
        assert!((noon.solar_mw - 2100.0).abs() < 1e-9);
        let thermal = 1500.0;
        assert!((noon.lng_mw - thermal * 0.60).abs() < 1e-9);
        assert!((noon.coal_mw - thermal * 0.30).abs() < 1e-9);
        // No その他 column in the fixture: other is the thermal remainder.
        assert!((noon.other_mw - thermal * 0.10).abs() < 1e-9);
    }

    #[test]
    fn total_falls_back_to_fuel_sum_without_total_column() {
        let adapter = OcctoGenerationAdapter::new();
        let series = adapter
            .parse_csv(fixture().as_slice(), "2025-11-03", Area::Tokyo)
            .unwrap();
        for point in &series.series {
            let fuel_sum = point.solar_mw
                + point.wind_mw
                + point.hydro_mw
                + point.nuclear_mw
                + point.lng_mw
                + point.coal_mw
                + point.other_mw;
            assert!((point.total_mw - fuel_sum).abs() < 1e-6);
        }
    }

    #[test]
    fn meta_is_recomputed_from_series() {
        let adapter = OcctoGenerationAdapter::new();
        let series = adapter
            .parse_csv(fixture().as_slice(), "2025-11-03", Area::Tokyo)
            .unwrap();
        let meta = series.meta.unwrap();
        assert!(meta.peak_solar_mw > 0.0);
        assert!(meta.avg_renewable_pct > 0.0);
        assert!(meta.avg_carbon_gco2_kwh > 0.0);
        assert!(meta.warning.is_none());
    }

    #[test]
    fn missing_fuel_columns_are_fatal() {
        let csv = "2025/11/03 06:00 UPDATE\n\
                   対象年月日,時刻,エリア名,太陽光(MW)\n\
                   2025/11/03,00:00,東京,0\n";
        let adapter = OcctoGenerationAdapter::new();
        let err = adapter
            .parse_csv(csv.as_bytes(), "2025-11-03", Area::Tokyo)
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingColumns { .. }));
    }

    #[test]
    fn other_area_rows_are_filtered_out() {
        let adapter = OcctoGenerationAdapter::new();
        let err = adapter
            .parse_csv(fixture().as_slice(), "2025-11-03", Area::Kansai)
            .unwrap_err();
        // Fixture only carries 東京 rows.
        assert!(matches!(err, ParseError::NoData { .. }));
    }
}
