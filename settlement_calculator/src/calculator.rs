use std::collections::HashMap;
use thiserror::Error;

use crate::models::{
    Assumptions, HourlyBreakdown, Period, PricePoint, PriceSource, SettlementRequest,
    SettlementResult, Totals,
};

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("profile is empty")]
    EmptyProfile,

    #[error("prices are empty")]
    EmptyPrices,

    #[error("pv_offset_pct must be between 0 and 1, got {0}")]
    InvalidPvOffset(f64),

    #[error("no price found for timestamp {0}")]
    MissingPrice(String),
}

/// Settle a consumption profile against hourly spot prices.
///
/// Per hour: effective kWh = kwh × (1 − pv_offset_pct), cost = effective ×
/// price. Totals accumulate the unrounded raw kWh and unrounded cost and
/// are rounded once at the end; breakdown rows are rounded independently
/// for display. The profile is taken in input order and is assumed
/// pre-sorted; every profile timestamp must have an exact matching price.
pub fn calculate(
    request: &SettlementRequest,
    prices: &[PricePoint],
    price_source: PriceSource,
) -> Result<SettlementResult, SettlementError> {
    if request.profile.is_empty() {
        return Err(SettlementError::EmptyProfile);
    }
    if prices.is_empty() {
        return Err(SettlementError::EmptyPrices);
    }
    if !(0.0..=1.0).contains(&request.pv_offset_pct) {
        return Err(SettlementError::InvalidPvOffset(request.pv_offset_pct));
    }

    let price_by_ts: HashMap<&str, f64> = prices
        .iter()
        .map(|p| (p.ts.as_str(), p.price))
        .collect();

    let mut total_kwh = 0.0;
    let mut total_cost = 0.0;
    let mut by_hour = Vec::with_capacity(request.profile.len());

    for point in &request.profile {
        let price = *price_by_ts
            .get(point.ts.as_str())
            .ok_or_else(|| SettlementError::MissingPrice(point.ts.clone()))?;

        let effective_kwh = point.kwh * (1.0 - request.pv_offset_pct);
        let cost = effective_kwh * price;

        total_kwh += point.kwh;
        total_cost += cost;

        by_hour.push(HourlyBreakdown {
            ts: point.ts.clone(),
            kwh: round_to(point.kwh, 0.1),
            price,
            cost: round_to(cost, 0.1),
        });
    }

    Ok(SettlementResult {
        period: Period {
            from: request.profile[0].ts.clone(),
            to: request.profile[request.profile.len() - 1].ts.clone(),
        },
        totals: Totals {
            kwh: round_to(total_kwh, 0.1),
            cost_yen: round_to(total_cost, 0.1),
        },
        by_hour,
        assumptions: Assumptions {
            pv_offset_pct: request.pv_offset_pct,
            area: request.prices.area.clone(),
        },
        source_prices: price_source,
    })
}

/// Round to the nearest multiple of `precision`, halves away from zero.
fn round_to(value: f64, precision: f64) -> f64 {
    if precision == 0.0 {
        return value;
    }
    (value / precision).round() * precision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricesRef, ProfilePoint};

    fn hourly_ts(hour: u32) -> String {
        format!("2025-10-23T{hour:02}:00:00+09:00")
    }

    fn flat_request(kwh: f64, hours: u32, pv_offset_pct: f64) -> SettlementRequest {
        SettlementRequest {
            profile: (0..hours)
                .map(|h| ProfilePoint {
                    ts: hourly_ts(h),
                    kwh,
                })
                .collect(),
            prices: PricesRef {
                area: "tokyo".to_string(),
                date: "2025-10-23".to_string(),
            },
            pv_offset_pct,
        }
    }

    fn flat_prices(price: f64, hours: u32) -> Vec<PricePoint> {
        (0..hours)
            .map(|h| PricePoint {
                ts: hourly_ts(h),
                price,
            })
            .collect()
    }

    fn jepx_source() -> PriceSource {
        PriceSource {
            name: "JEPX".to_string(),
            url: "https://www.jepx.jp/".to_string(),
        }
    }

    #[test]
    fn flat_profile_flat_price_golden_values() {
        // 100 kWh × 24 h at 30 JPY/kWh with 15% PV offset:
        // totals are 2400.0 kWh (raw) and 61,200.0 JPY (effective).
        let request = flat_request(100.0, 24, 0.15);
        let prices = flat_prices(30.0, 24);

        let result = calculate(&request, &prices, jepx_source()).unwrap();

        assert_eq!(result.totals.kwh, 2400.0);
        assert_eq!(result.totals.cost_yen, 61200.0);
        assert_eq!(result.by_hour.len(), 24);
        // 100 × 30 × 0.85 per hour
        assert_eq!(result.by_hour[0].cost, 2550.0);
        assert_eq!(result.by_hour[0].kwh, 100.0);
        assert_eq!(result.assumptions.pv_offset_pct, 0.15);
        assert_eq!(result.assumptions.area, "tokyo");
        assert_eq!(result.source_prices.name, "JEPX");
        assert_eq!(result.period.from, hourly_ts(0));
        assert_eq!(result.period.to, hourly_ts(23));
    }

    #[test]
    fn single_hour_rounding_precision() {
        let request = SettlementRequest {
            profile: vec![ProfilePoint {
                ts: hourly_ts(0),
                kwh: 123.456,
            }],
            prices: PricesRef {
                area: "tokyo".to_string(),
                date: "2025-10-23".to_string(),
            },
            pv_offset_pct: 0.0,
        };
        let prices = flat_prices(25.789, 1);

        let result = calculate(&request, &prices, jepx_source()).unwrap();

        // 123.456 → 123.5; 123.456 × 25.789 = 3183.8… → ≈3184.0 ± 0.5
        assert!((result.totals.kwh - 123.5).abs() < 0.01);
        assert!(result.totals.cost_yen > 3183.5 && result.totals.cost_yen < 3184.5);
        assert!((result.by_hour[0].kwh - 123.5).abs() < 0.01);
    }

    #[test]
    fn totals_round_once_not_per_hour() {
        // Each hour's cost is 10.04 (rounds down to 10.0); 10 hours of
        // accumulated unrounded cost give 100.4, not 100.0.
        let request = flat_request(1.0, 10, 0.0);
        let prices = flat_prices(10.04, 10);

        let result = calculate(&request, &prices, jepx_source()).unwrap();

        assert_eq!(result.totals.cost_yen, 100.4);
        for hour in &result.by_hour {
            assert_eq!(hour.cost, 10.0);
        }
    }

    #[test]
    fn missing_price_is_rejected() {
        let request = flat_request(100.0, 2, 0.0);
        let prices = flat_prices(30.0, 1); // hour 1 has no price

        let err = calculate(&request, &prices, jepx_source()).unwrap_err();
        match err {
            SettlementError::MissingPrice(ts) => assert_eq!(ts, hourly_ts(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn pv_offset_outside_unit_interval_is_rejected() {
        let prices = flat_prices(30.0, 1);
        for bad in [1.5, -0.1] {
            let request = flat_request(100.0, 1, bad);
            assert!(matches!(
                calculate(&request, &prices, jepx_source()),
                Err(SettlementError::InvalidPvOffset(_))
            ));
        }
        // Boundary values are accepted.
        for ok in [0.0, 1.0] {
            let request = flat_request(100.0, 1, ok);
            assert!(calculate(&request, &prices, jepx_source()).is_ok());
        }
    }

    #[test]
    fn empty_profile_and_empty_prices_are_rejected() {
        let mut request = flat_request(100.0, 1, 0.0);
        request.profile.clear();
        assert!(matches!(
            calculate(&request, &flat_prices(30.0, 1), jepx_source()),
            Err(SettlementError::EmptyProfile)
        ));

        let request = flat_request(100.0, 1, 0.0);
        assert!(matches!(
            calculate(&request, &[], jepx_source()),
            Err(SettlementError::EmptyPrices)
        ));
    }

    #[test]
    fn full_pv_offset_zeroes_cost_but_keeps_raw_kwh() {
        let request = flat_request(100.0, 24, 1.0);
        let prices = flat_prices(30.0, 24);

        let result = calculate(&request, &prices, jepx_source()).unwrap();
        assert_eq!(result.totals.kwh, 2400.0);
        assert_eq!(result.totals.cost_yen, 0.0);
    }

    #[test]
    fn round_to_halves_away_from_zero() {
        let cases = [
            (12345.67, 12345.7),
            (302100.456, 302100.5),
            (123.456, 123.5),
            (123.44, 123.4),
            (123.45, 123.5),
            (100.0, 100.0),
        ];
        for (value, want) in cases {
            assert_eq!(round_to(value, 0.1), want, "round_to({value}, 0.1)");
        }
        assert_eq!(round_to(5.0, 0.0), 5.0);
    }
}
