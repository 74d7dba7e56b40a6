use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::io::Read;

use crate::columns::{detect_columns, line_of, read_record, ColumnSpec, Pattern};
use crate::error::ParseError;
use crate::models::{
    reserve_status, Area, AreaReserve, DemandPoint, DemandSeries, Meta, ReserveSeries, Source,
};
use crate::timeutil;

/// OCCTO (the cross-regional transmission coordinator) publishes one CSV
/// covering every grid area at 30-minute resolution, prefixed with a
/// free-text "UPDATE" banner. The same download backs two products here:
/// day-average reserve margins per area, and an hourly demand series for a
/// single area.
pub struct OcctoAdapter {
    source_url: String,
}

/// Token identifying the real header row; everything above it is banner.
const HEADER_ANCHOR: &str = "対象年月日";

const RESERVE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "date",
        patterns: &[Pattern::Contains("対象年月日"), Pattern::Contains("date")],
    },
    ColumnSpec {
        name: "area",
        patterns: &[Pattern::Exact("エリア名"), Pattern::Contains("area")],
    },
    // The block-wide columns (広域ブロック需要 etc.) must not match, so the
    // area-scoped columns are exact tokens.
    ColumnSpec {
        name: "demand",
        patterns: &[Pattern::Exact("エリア需要(mw)"), Pattern::Exact("エリア需要")],
    },
    ColumnSpec {
        name: "capacity",
        patterns: &[
            Pattern::Exact("エリア供給力(mw)"),
            Pattern::Exact("エリア供給力"),
        ],
    },
];

const DEMAND_COLUMNS: &[ColumnSpec] = &[
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
        name: "demand",
        patterns: &[Pattern::Exact("エリア需要(mw)"), Pattern::Exact("エリア需要")],
    },
];

impl OcctoAdapter {
    pub fn new() -> Self {
        Self {
            source_url: "https://web-kohyo.occto.or.jp/".to_string(),
        }
    }

    /// Parse the reserve CSV into per-area day-average reserve margins.
    /// 30-minute demand/capacity samples are averaged over the whole day;
    /// margin = (capacity − demand) / capacity × 100.
    pub fn parse_reserve_csv(
        &self,
        reader: impl Read,
        date: &str,
    ) -> Result<ReserveSeries, ParseError> {
        let target = timeutil::normalize_date(date)
            .ok_or_else(|| ParseError::InvalidDate(date.to_string()))?;

        let mut csv_reader = csv_reader(reader);
        let mut records = csv_reader.records();
        let header = find_header(&mut records)?;

        let cols = detect_columns(&header, RESERVE_COLUMNS);
        cols.require(&["date", "area", "demand", "capacity"], &header)?;
        let date_idx = cols.get("date").unwrap();
        let area_idx = cols.get("area").unwrap();
        let demand_idx = cols.get("demand").unwrap();
        let capacity_idx = cols.get("capacity").unwrap();

        // Sorted map keeps serialized output stable across runs.
        let mut sums: BTreeMap<String, (f64, f64, u32)> = BTreeMap::new();

        for record in records {
            let record = read_record(record)?;

            let row_date = record.get(date_idx).unwrap_or("");
            if timeutil::normalize_date(row_date).as_deref() != Some(target.as_str()) {
                continue;
            }

            let area = normalize_area(record.get(area_idx).unwrap_or(""));
            if area.is_empty() {
                continue;
            }

            // Multi-area aggregate feed: malformed numeric cells lose the
            // sample, not the parse.
            let demand: f64 = match record.get(demand_idx).and_then(|c| c.parse().ok()) {
                Some(v) => v,
                None => continue,
            };
            let capacity: f64 = match record.get(capacity_idx).and_then(|c| c.parse().ok()) {
                Some(v) => v,
                None => continue,
            };

            let entry = sums.entry(area).or_insert((0.0, 0.0, 0));
            entry.0 += demand;
            entry.1 += capacity;
            entry.2 += 1;
        }

        if sums.is_empty() {
            return Err(ParseError::NoData { date: target });
        }

        let mut series = ReserveSeries::new(&target);
        series.source = Source {
            name: "OCCTO".to_string(),
            url: self.source_url.clone(),
        };

        for (area, (demand_sum, capacity_sum, count)) in sums {
            let avg_demand = demand_sum / count as f64;
            let avg_capacity = capacity_sum / count as f64;
            let margin = if avg_capacity > 0.0 {
                (avg_capacity - avg_demand) / avg_capacity * 100.0
            } else {
                0.0
            };
            series.areas.push(AreaReserve {
                area,
                reserve_margin_pct: margin,
                status: reserve_status(margin).to_string(),
            });
        }

        Ok(series)
    }

    /// Parse the same feed into an hourly demand series for one area,
    /// averaging the two 30-minute samples of each hour.
    pub fn parse_demand_csv(
        &self,
        reader: impl Read,
        date: &str,
        target_area: Area,
    ) -> Result<DemandSeries, ParseError> {
        let target = timeutil::normalize_date(date)
            .ok_or_else(|| ParseError::InvalidDate(date.to_string()))?;
        let base_date = timeutil::parse_date(&target)?;

        let mut csv_reader = csv_reader(reader);
        let mut records = csv_reader.records();
        let header = find_header(&mut records)?;

        let cols = detect_columns(&header, DEMAND_COLUMNS);
        cols.require(&["date", "time", "area", "demand"], &header)?;
        let date_idx = cols.get("date").unwrap();
        let time_idx = cols.get("time").unwrap();
        let area_idx = cols.get("area").unwrap();
        let demand_idx = cols.get("demand").unwrap();

        let mut buckets: BTreeMap<u32, (f64, u32)> = BTreeMap::new();

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

            let demand: f64 = match record.get(demand_idx).and_then(|c| c.parse().ok()) {
                Some(v) => v,
                None => continue,
            };

            let entry = buckets.entry(hour).or_insert((0.0, 0));
            entry.0 += demand;
            entry.1 += 1;
        }

        if buckets.is_empty() {
            return Err(ParseError::NoData { date: target });
        }

        let mut series = DemandSeries::new(target_area, &target);
        series.source = Source {
            name: "OCCTO".to_string(),
            url: self.source_url.clone(),
        };
        for (hour, (sum, count)) in buckets {
            series.series.push(DemandPoint {
                ts: timeutil::hour_timestamp(base_date, hour),
                demand_mw: sum / count as f64,
                forecast_mw: None, // this feed carries no forecasts
            });
        }

        let mut warnings = vec!["Forecast data not available for this date".to_string()];
        if series.series.len() < 24 {
            warnings.push(format!(
                "Data for {} hours available (expected 24)",
                series.series.len()
            ));
        }
        series.meta = Some(Meta {
            warning: Some(warnings.join("; ")),
        });

        Ok(series)
    }
}

impl Default for OcctoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn csv_reader(reader: impl Read) -> Reader<impl Read> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

/// Skip the banner rows until the anchored header row.
pub(crate) fn find_header<R: Read>(
    records: &mut csv::StringRecordsIter<'_, R>,
) -> Result<StringRecord, ParseError> {
    for record in records.by_ref() {
        let record = read_record(record)?;
        if record.iter().any(|cell| cell.contains(HEADER_ANCHOR)) {
            return Ok(record);
        }
    }
    Err(ParseError::HeaderNotFound {
        anchor: HEADER_ANCHOR,
    })
}

/// Map feed area names (Japanese or romanized) onto canonical lowercase
/// names. Unknown areas pass through lowercased so the reserve view covers
/// the whole country.
pub(crate) fn normalize_area(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    if lowered == "東京" || lowered.contains("tokyo") {
        return "tokyo".to_string();
    }
    if lowered == "関西" || lowered.contains("kansai") {
        return "kansai".to_string();
    }
    lowered
}
