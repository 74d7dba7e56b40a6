use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Grid areas this pipeline supports. Other OCCTO areas appear in reserve
/// data as raw strings but have no dedicated demand/price feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Tokyo,
    Kansai,
}

impl Area {
    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Tokyo => "tokyo",
            Area::Kansai => "kansai",
        }
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribution for the upstream feed a series was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandPoint {
    pub ts: DateTime<FixedOffset>,
    pub demand_mw: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_mw: Option<f64>,
}

/// Hourly demand for one area on one civil day (Asia/Tokyo).
/// Timestamps are strictly increasing, unique, and all within `date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandSeries {
    pub date: String,
    pub area: Area,
    pub timezone: String,
    pub timescale: String,
    pub series: Vec<DemandPoint>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl DemandSeries {
    pub fn new(area: Area, date: &str) -> Self {
        Self {
            date: date.to_string(),
            area,
            timezone: "Asia/Tokyo".to_string(),
            timescale: "hourly".to_string(),
            series: Vec::with_capacity(24),
            source: Source {
                name: String::new(),
                url: String::new(),
            },
            meta: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub ts: DateTime<FixedOffset>,
    pub price: f64,
}

/// Hourly day-ahead spot prices for one area on one civil day, JPY/kWh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub date: String,
    pub area: Area,
    pub timescale: String,
    pub price_yen_per_kwh: Vec<PricePoint>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl PriceSeries {
    pub fn new(area: Area, date: &str) -> Self {
        Self {
            date: date.to_string(),
            area,
            timescale: "hourly".to_string(),
            price_yen_per_kwh: Vec::with_capacity(24),
            source: Source {
                name: String::new(),
                url: String::new(),
            },
            meta: None,
        }
    }
}

/// One area's day-average reserve margin and its tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaReserve {
    pub area: String,
    pub reserve_margin_pct: f64,
    pub status: String,
}

/// System-wide reserve margins for one civil day. Areas are kept sorted by
/// name so serializing the same inputs twice is byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveSeries {
    pub date: String,
    pub areas: Vec<AreaReserve>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ReserveSeries {
    pub fn new(date: &str) -> Self {
        Self {
            date: date.to_string(),
            areas: Vec::new(),
            source: Source {
                name: String::new(),
                url: String::new(),
            },
            meta: None,
        }
    }
}

/// Classify a reserve margin percentage into a supply-tightness tier.
/// Thresholds: below 3% the area is at rolling-blackout risk ("critical"),
/// below 8% supply is "tight", otherwise "normal".
pub fn reserve_status(margin_pct: f64) -> &'static str {
    if margin_pct < 3.0 {
        "critical"
    } else if margin_pct < 8.0 {
        "tight"
    } else {
        "normal"
    }
}

/// Per-fuel emission factors in gCO2/kWh. Renewables and nuclear count as
/// zero; "other" covers oil and miscellaneous thermal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionFactors {
    pub lng: f64,
    pub coal: f64,
    pub other: f64,
}

impl Default for EmissionFactors {
    fn default() -> Self {
        Self {
            lng: 350.0,
            coal: 850.0,
            other: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPoint {
    pub ts: DateTime<FixedOffset>,
    pub solar_mw: f64,
    pub wind_mw: f64,
    pub hydro_mw: f64,
    pub nuclear_mw: f64,
    pub lng_mw: f64,
    pub coal_mw: f64,
    pub other_mw: f64,
    pub total_mw: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMeta {
    pub avg_renewable_pct: f64,
    pub avg_carbon_gco2_kwh: f64,
    pub peak_solar_mw: f64,
    pub peak_wind_mw: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Hourly generation by fuel for one area on one civil day.
///
/// `total_mw` is the reported (or demand-derived) total for the hour. Fuel
/// categories are clamped at zero during estimation and seasonal
/// rebalancing, so on extreme inputs the fuel sum may fall below
/// `total_mw`; the per-point fuel sum is NOT an invariant of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSeries {
    pub date: String,
    pub area: Area,
    pub timezone: String,
    pub timescale: String,
    pub series: Vec<GenerationPoint>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<GenerationMeta>,
}

impl GenerationSeries {
    pub fn new(area: Area, date: &str) -> Self {
        Self {
            date: date.to_string(),
            area,
            timezone: "Asia/Tokyo".to_string(),
            timescale: "hourly".to_string(),
            series: Vec::with_capacity(24),
            source: Source {
                name: String::new(),
                url: String::new(),
            },
            meta: None,
        }
    }

    /// Recompute the aggregate block from the series, preserving any
    /// warning already attached.
    pub fn recompute_meta(&mut self, emission: &EmissionFactors) {
        if self.series.is_empty() {
            return;
        }

        let mut renewable_pct_sum = 0.0;
        let mut carbon_sum = 0.0;
        let mut peak_solar: f64 = 0.0;
        let mut peak_wind: f64 = 0.0;

        for point in &self.series {
            if point.total_mw > 0.0 {
                let renewable_mw = point.solar_mw + point.wind_mw + point.hydro_mw;
                renewable_pct_sum += renewable_mw / point.total_mw * 100.0;

                let carbon = (point.lng_mw * emission.lng
                    + point.coal_mw * emission.coal
                    + point.other_mw * emission.other)
                    / point.total_mw;
                carbon_sum += carbon;
            }

            peak_solar = peak_solar.max(point.solar_mw);
            peak_wind = peak_wind.max(point.wind_mw);
        }

        let count = self.series.len() as f64;
        let warning = self.meta.take().and_then(|m| m.warning);
        self.meta = Some(GenerationMeta {
            avg_renewable_pct: renewable_pct_sum / count,
            avg_carbon_gco2_kwh: carbon_sum / count,
            peak_solar_mw: peak_solar,
            peak_wind_mw: peak_wind,
            warning,
        });
    }
}
