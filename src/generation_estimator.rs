use chrono::Datelike;

use crate::error::EstimateError;
use crate::models::{
    DemandSeries, EmissionFactors, GenerationPoint, GenerationSeries, PriceSeries, Source,
};
use crate::timeutil;

/// Every heuristic constant of the estimator, in one overridable struct so
/// tests and callers never depend on hidden defaults. The defaults track
/// approximate national baseline shares.
#[derive(Debug, Clone)]
pub struct EstimatorParams {
    /// Fixed fractions of total demand.
    pub nuclear_share: f64,
    pub wind_share: f64,
    pub hydro_share: f64,
    /// Ceiling on solar as a fraction of total demand at full output.
    pub max_solar_share: f64,
    /// How far a low in-day relative price can bias solar upward (0.3 =
    /// up to 30%).
    pub price_response: f64,
    /// How the fossil residual is split.
    pub lng_split: f64,
    pub coal_split: f64,
    pub other_split: f64,
    pub emission: EmissionFactors,
    /// Seasonal multipliers: longer days boost summer solar; winter cuts
    /// solar and leans on nuclear for heating load.
    pub summer_solar_boost: f64,
    pub winter_solar_cut: f64,
    pub winter_nuclear_boost: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            nuclear_share: 0.27,
            wind_share: 0.03,
            hydro_share: 0.08,
            max_solar_share: 0.18,
            price_response: 0.30,
            lng_split: 0.60,
            coal_split: 0.30,
            other_split: 0.10,
            emission: EmissionFactors::default(),
            summer_solar_boost: 1.10,
            winter_solar_cut: 0.80,
            winter_nuclear_boost: 1.05,
        }
    }
}

/// Derives a plausible per-fuel generation mix from aligned demand and spot
/// price series. This is openly a heuristic estimator — solar follows a
/// time-of-day curve biased by relative price (the duck curve), baseload
/// fuels are fixed demand fractions, fossil fuels absorb the residual — not
/// a dispatch model.
pub struct GenerationEstimator {
    params: EstimatorParams,
}

impl GenerationEstimator {
    pub fn new(params: EstimatorParams) -> Self {
        Self { params }
    }

    /// Estimate the mix for one day. Requires equal-length, hour-aligned
    /// inputs; the contract is validated, not truncated to the shorter
    /// series. A seasonal pass and the aggregate meta are applied before
    /// returning.
    pub fn estimate(
        &self,
        demand: &DemandSeries,
        prices: &PriceSeries,
    ) -> Result<GenerationSeries, EstimateError> {
        if demand.series.is_empty() || prices.price_yen_per_kwh.is_empty() {
            return Err(EstimateError::EmptyInput);
        }
        if demand.series.len() != prices.price_yen_per_kwh.len() {
            return Err(EstimateError::LengthMismatch {
                demand: demand.series.len(),
                prices: prices.price_yen_per_kwh.len(),
            });
        }

        let (min_price, max_price) = price_range(prices);

        let mut series = GenerationSeries::new(demand.area, &demand.date);
        series.source = Source {
            name: "Estimated (demand + price correlation)".to_string(),
            url: "internal calculation".to_string(),
        };

        for (index, (demand_point, price_point)) in demand
            .series
            .iter()
            .zip(&prices.price_yen_per_kwh)
            .enumerate()
        {
            if demand_point.ts != price_point.ts {
                return Err(EstimateError::Misaligned { index });
            }

            let total = demand_point.demand_mw;
            let hour = chrono::Timelike::hour(&demand_point.ts);

            let solar = self.estimate_solar(hour, price_point.price, min_price, max_price, total);
            let nuclear = total * self.params.nuclear_share;
            let wind = total * self.params.wind_share;
            let hydro = total * self.params.hydro_share;

            // Fossil fuels absorb what the other categories leave behind,
            // floored at zero.
            let fossil = (total - solar - nuclear - wind - hydro).max(0.0);

            series.series.push(GenerationPoint {
                ts: demand_point.ts,
                solar_mw: solar,
                wind_mw: wind,
                hydro_mw: hydro,
                nuclear_mw: nuclear,
                lng_mw: fossil * self.params.lng_split,
                coal_mw: fossil * self.params.coal_split,
                other_mw: fossil * self.params.other_split,
                total_mw: total,
            });
        }

        let date = timeutil::parse_date(&series.date)
            .map_err(|_| EstimateError::BadDate(series.date.clone()))?;
        self.apply_seasonal_adjustment(&mut series, date.month());
        series.recompute_meta(&self.params.emission);

        Ok(series)
    }

    fn estimate_solar(
        &self,
        hour: u32,
        price: f64,
        min_price: f64,
        max_price: f64,
        total_demand: f64,
    ) -> f64 {
        let time_factor = solar_time_factor(hour);

        // Cheap in-day prices imply high solar output pushing the clearing
        // price down; scale the estimate up toward the low end of the range.
        let price_factor = if max_price > min_price {
            let normalized = (price - min_price) / (max_price - min_price);
            1.0 - normalized * self.params.price_response
        } else {
            1.0
        };

        (total_demand * self.params.max_solar_share * time_factor * price_factor).max(0.0)
    }

    /// Perturb solar by month and rebalance the fossil categories to absorb
    /// the delta. LNG and coal are clamped at zero afterwards, so the fuel
    /// sum may drop below `total_mw` on extreme inputs — the clamp is kept
    /// intentionally and the type documents that the sum is not an
    /// invariant.
    pub fn apply_seasonal_adjustment(&self, series: &mut GenerationSeries, month: u32) {
        let is_summer = (6..=8).contains(&month);
        let is_winter = month == 12 || month <= 2;

        for point in &mut series.series {
            if is_summer {
                point.solar_mw *= self.params.summer_solar_boost;
                let delta = point.solar_mw * (self.params.summer_solar_boost - 1.0);
                point.lng_mw -= delta * 0.6;
                point.coal_mw -= delta * 0.4;
            }

            if is_winter {
                point.solar_mw *= self.params.winter_solar_cut;
                point.nuclear_mw *= self.params.winter_nuclear_boost;
                let delta = point.nuclear_mw * (self.params.winter_nuclear_boost - 1.0);
                point.lng_mw -= delta * 0.6;
                point.coal_mw -= delta * 0.4;
            }

            point.lng_mw = point.lng_mw.max(0.0);
            point.coal_mw = point.coal_mw.max(0.0);
        }
    }
}

impl Default for GenerationEstimator {
    fn default() -> Self {
        Self::new(EstimatorParams::default())
    }
}

/// Time-of-day solar output factor in [0, 1]: zero overnight (22:00–05:00),
/// a quadratic sunrise ramp 06:00–10:00, full output 11:00–14:00, a
/// quadratic decline 15:00–18:00 and a small residual tail 19:00–21:00.
pub fn solar_time_factor(hour: u32) -> f64 {
    match hour {
        6..=10 => {
            let t = (hour as f64 - 5.0) / 6.0;
            t * t
        }
        11..=14 => 1.0,
        15..=18 => {
            let t = (19.0 - hour as f64) / 6.0;
            t * t
        }
        19..=21 => 0.05,
        _ => 0.0,
    }
}

fn price_range(prices: &PriceSeries) -> (f64, f64) {
    let mut min = prices.price_yen_per_kwh[0].price;
    let mut max = min;
    for point in &prices.price_yen_per_kwh {
        min = min.min(point.price);
        max = max.max(point.price);
    }
    (min, max)
}
