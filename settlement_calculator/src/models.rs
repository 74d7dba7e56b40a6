use serde::{Deserialize, Serialize};

/// One hour of metered consumption. Timestamps are RFC 3339 strings with
/// the +09:00 offset, matched against price timestamps by exact string
/// equality — no parsing, no interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub ts: String,
    pub kwh: f64,
}

/// Which stored spot-price artifact to settle against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesRef {
    pub area: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub profile: Vec<ProfilePoint>,
    pub prices: PricesRef,
    pub pv_offset_pct: f64,
}

/// One hourly spot price as stored by the pipeline's `spot` artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub ts: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Totals {
    pub kwh: f64,
    pub cost_yen: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBreakdown {
    pub ts: String,
    pub kwh: f64,
    pub price: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assumptions {
    pub pv_offset_pct: f64,
    pub area: String,
}

/// Settlement output. Totals are computed from unrounded per-hour values
/// and rounded once; the per-hour breakdown is rounded independently for
/// display and may not sum exactly to the rounded totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub period: Period,
    pub totals: Totals,
    pub by_hour: Vec<HourlyBreakdown>,
    pub assumptions: Assumptions,
    pub source_prices: PriceSource,
}
