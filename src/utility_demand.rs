//! Shared row-level parsing for the utility demand CSVs (TEPCO, Kansai).
//! Both publishers ship the same overall shape — free-text preamble, a
//! header row anchored on the date column, hourly rows in 万kW with an
//! optional forecast column, 5-minute rows interleaved — but differ in
//! encoding and header wording, which each adapter declares.

use csv::{ReaderBuilder, Trim};
use std::collections::BTreeMap;

use crate::columns::{detect_columns, line_of, read_record, ColumnSpec};
use crate::error::ParseError;
use crate::models::{Area, DemandPoint, DemandSeries, Meta, Source};
use crate::timeutil;

pub(crate) struct UtilityDemandFormat {
    /// Tokens that identify the header row by its first cell (compared
    /// trimmed and lowercased).
    pub anchor: &'static [&'static str],
    pub columns: &'static [ColumnSpec],
    /// Source unit → MW. The utility feeds report 万kW (10 MW units).
    pub scale: f64,
}

pub(crate) fn parse_utility_demand(
    text: &str,
    date: &str,
    area: Area,
    format: &UtilityDemandFormat,
    source: Source,
) -> Result<DemandSeries, ParseError> {
    let target = timeutil::normalize_date(date)
        .ok_or_else(|| ParseError::InvalidDate(date.to_string()))?;
    let base_date = timeutil::parse_date(&target)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = reader.records();

    // Skip the preamble ("last updated" banner and blank lines) until the
    // anchored header row.
    let header = loop {
        let record = match records.next() {
            Some(r) => read_record(r)?,
            None => {
                return Err(ParseError::HeaderNotFound {
                    anchor: format.anchor[0],
                })
            }
        };
        let first = record.get(0).unwrap_or("").trim().to_lowercase();
        if format.anchor.iter().any(|a| first == *a) {
            break record;
        }
    };

    let cols = detect_columns(&header, format.columns);
    cols.require(&["date", "time", "actual"], &header)?;
    let date_idx = cols.get("date").unwrap();
    let time_idx = cols.get("time").unwrap();
    let actual_idx = cols.get("actual").unwrap();
    let forecast_idx = cols.get("forecast");

    let mut points: BTreeMap<u32, DemandPoint> = BTreeMap::new();
    let mut has_forecast = false;

    for record in records {
        let record = read_record(record)?;
        let line = line_of(&record);

        let row_date = match record.get(date_idx) {
            Some(cell) => cell,
            None => continue,
        };
        if timeutil::normalize_date(row_date).as_deref() != Some(target.as_str()) {
            continue;
        }

        let row_time = record.get(time_idx).unwrap_or("");
        let (hour, minute) = timeutil::parse_clock(row_time).ok_or_else(|| {
            ParseError::InvalidTime {
                line,
                value: row_time.to_string(),
            }
        })?;

        // Only keep on-the-hour samples; the feeds interleave 5-minute rows.
        if minute != 0 {
            continue;
        }
        // The CSV repeats hours across redundant blocks; first wins.
        if points.contains_key(&hour) {
            continue;
        }

        let actual_raw = record.get(actual_idx).unwrap_or("");
        let actual: f64 = actual_raw.parse().map_err(|_| ParseError::InvalidValue {
            line,
            column: "actual",
            value: actual_raw.to_string(),
        })?;

        let forecast_mw = forecast_idx
            .and_then(|idx| record.get(idx))
            .filter(|cell| !cell.is_empty())
            .and_then(|cell| cell.parse::<f64>().ok())
            .map(|v| v * format.scale);
        if forecast_mw.is_some() {
            has_forecast = true;
        }

        points.insert(
            hour,
            DemandPoint {
                ts: timeutil::hour_timestamp(base_date, hour),
                demand_mw: actual * format.scale,
                forecast_mw,
            },
        );
    }

    if points.is_empty() {
        return Err(ParseError::NoData { date: target });
    }

    let mut series = DemandSeries::new(area, &target);
    series.source = source;
    series.series = points.into_values().collect();

    let mut warnings = Vec::new();
    if !has_forecast {
        warnings.push("Forecast data not available for this date".to_string());
    }
    if series.series.len() < 24 {
        warnings.push(format!(
            "Data for {} hours available (expected 24)",
            series.series.len()
        ));
    }
    if !warnings.is_empty() {
        series.meta = Some(Meta {
            warning: Some(warnings.join("; ")),
        });
    }

    Ok(series)
}
