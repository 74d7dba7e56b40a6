use csv::{ReaderBuilder, Trim};
use std::collections::BTreeMap;
use std::io::Read;

use crate::columns::{detect_columns, line_of, read_record, ColumnSpec, Pattern};
use crate::error::ParseError;
use crate::models::{Area, Meta, PricePoint, PriceSeries, Source};
use crate::timeutil;

/// JEPX day-ahead spot price feed. One CSV carries all areas as separate
/// price columns; the adapter selects the requested area's column, with a
/// generic price column as fallback for older file layouts.
pub struct JepxAdapter {
    source_url: String,
}

const TOKYO_PRICE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "date",
        patterns: &[Pattern::Contains("date"), Pattern::Exact("日付"), Pattern::Exact("年月日")],
    },
    ColumnSpec {
        name: "hour",
        patterns: &[Pattern::Contains("hour"), Pattern::Exact("時"), Pattern::Exact("時刻")],
    },
    ColumnSpec {
        name: "price",
        patterns: &[
            Pattern::Contains("tokyo_price"),
            Pattern::Exact("東京価格"),
            Pattern::Contains("price"),
            Pattern::Contains("価格"),
        ],
    },
];

const KANSAI_PRICE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "date",
        patterns: &[Pattern::Contains("date"), Pattern::Exact("日付"), Pattern::Exact("年月日")],
    },
    ColumnSpec {
        name: "hour",
        patterns: &[Pattern::Contains("hour"), Pattern::Exact("時"), Pattern::Exact("時刻")],
    },
    ColumnSpec {
        name: "price",
        patterns: &[
            Pattern::Contains("kansai_price"),
            Pattern::Exact("関西価格"),
            Pattern::Contains("price"),
            Pattern::Contains("価格"),
        ],
    },
];

fn price_columns_for(area: Area) -> &'static [ColumnSpec] {
    match area {
        Area::Tokyo => TOKYO_PRICE_COLUMNS,
        Area::Kansai => KANSAI_PRICE_COLUMNS,
    }
}

impl JepxAdapter {
    pub fn new() -> Self {
        Self {
            source_url: "https://www.jepx.jp/".to_string(),
        }
    }

    pub fn parse_csv(
        &self,
        mut reader: impl Read,
        date: &str,
        area: Area,
    ) -> Result<PriceSeries, ParseError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let text = String::from_utf8(raw).map_err(|_| ParseError::Encoding {
            encoding: "UTF-8",
        })?;

        let target = timeutil::normalize_date(date)
            .ok_or_else(|| ParseError::InvalidDate(date.to_string()))?;
        let base_date = timeutil::parse_date(&target)?;

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());
        let mut records = csv_reader.records();

        let header = match records.next() {
            Some(r) => read_record(r)?,
            None => return Err(ParseError::HeaderNotFound { anchor: "date" }),
        };

        let cols = detect_columns(&header, price_columns_for(area));
        cols.require(&["date", "hour", "price"], &header)?;
        let date_idx = cols.get("date").unwrap();
        let hour_idx = cols.get("hour").unwrap();
        let price_idx = cols.get("price").unwrap();

        let mut points: BTreeMap<u32, PricePoint> = BTreeMap::new();

        for record in records {
            let record = read_record(record)?;
            let line = line_of(&record);

            let row_date = match record.get(date_idx) {
                Some(cell) if !cell.is_empty() => cell,
                _ => continue,
            };
            if timeutil::normalize_date(row_date).as_deref() != Some(target.as_str()) {
                continue;
            }

            let hour_raw = record.get(hour_idx).unwrap_or("");
            let hour: i64 = hour_raw.parse().map_err(|_| ParseError::InvalidHour {
                line,
                value: hour_raw.to_string(),
            })?;
            if !(0..=23).contains(&hour) {
                return Err(ParseError::HourOutOfRange { line, value: hour });
            }

            // Spot prices are a single-area selection: a malformed price on
            // a matched row is fatal rather than skippable.
            let price_raw = record.get(price_idx).unwrap_or("");
            let price: f64 = price_raw.parse().map_err(|_| ParseError::InvalidValue {
                line,
                column: "price",
                value: price_raw.to_string(),
            })?;

            points.entry(hour as u32).or_insert(PricePoint {
                ts: timeutil::hour_timestamp(base_date, hour as u32),
                price,
            });
        }

        if points.is_empty() {
            return Err(ParseError::NoData { date: target });
        }

        let mut series = PriceSeries::new(area, &target);
        series.source = Source {
            name: "JEPX".to_string(),
            url: self.source_url.clone(),
        };
        series.price_yen_per_kwh = points.into_values().collect();

        if series.price_yen_per_kwh.len() < 24 {
            series.meta = Some(Meta {
                warning: Some(format!(
                    "Data for {} hours available (expected 24)",
                    series.price_yen_per_kwh.len()
                )),
            });
        }

        Ok(series)
    }
}

impl Default for JepxAdapter {
    fn default() -> Self {
        Self::new()
    }
}
