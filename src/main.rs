use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

mod circuit_breaker;
mod columns;
mod error;
mod fetch;
mod generation_estimator;
mod jepx_adapter;
mod kansai_adapter;
mod models;
mod occto_adapter;
mod occto_generation_adapter;
mod sources;
mod storage;
mod tepco_adapter;
mod timeutil;
mod utility_demand;

use circuit_breaker::CircuitBreaker;
use fetch::{Fetcher, FetcherConfig};
use generation_estimator::GenerationEstimator;
use jepx_adapter::JepxAdapter;
use kansai_adapter::KansaiAdapter;
use models::{Area, DemandSeries, PriceSeries};
use occto_adapter::OcctoAdapter;
use occto_generation_adapter::OcctoGenerationAdapter;
use sources::{
    demand_adapter_for, jepx_spot_url, occto_csv_url, DemandAdapterKind, FetchMode, OcctoFeed,
    Sources,
};
use storage::ArtifactStore;
use tepco_adapter::TepcoAdapter;

#[derive(Parser)]
#[command(name = "jp_market_processor")]
#[command(about = "Normalize Japanese electricity-market feeds into hourly JSON artifacts")]
struct Cli {
    /// Root directory for the JSON artifact store
    #[arg(long, default_value = "public/data/jp")]
    out_dir: PathBuf,

    /// Directory holding bundled sample CSVs for fixture mode
    #[arg(long, default_value = "testdata")]
    fixture_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and normalize hourly demand for one area and date
    FetchDemand {
        #[arg(long, value_enum)]
        area: Area,
        /// Date in YYYY-MM-DD format
        #[arg(long)]
        date: String,
        /// Fetch the live feed instead of the bundled fixture
        #[arg(long)]
        use_http: bool,
    },
    /// Fetch and normalize JEPX day-ahead spot prices
    FetchPrices {
        #[arg(long, value_enum)]
        area: Area,
        #[arg(long)]
        date: String,
        #[arg(long)]
        use_http: bool,
    },
    /// Fetch and normalize system-wide reserve margins
    FetchReserve {
        #[arg(long)]
        date: String,
        #[arg(long)]
        use_http: bool,
    },
    /// Fetch and normalize per-fuel generation from the operator feed
    FetchGeneration {
        #[arg(long, value_enum)]
        area: Area,
        #[arg(long)]
        date: String,
        #[arg(long)]
        use_http: bool,
    },
    /// Estimate the generation mix from stored demand and price artifacts
    EstimateGeneration {
        #[arg(long, value_enum)]
        area: Area,
        #[arg(long)]
        date: String,
    },
    /// Run demand, prices and reserve for a date range across all areas
    Backfill {
        /// First date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: String,
        /// Last date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: String,
        #[arg(long)]
        use_http: bool,
    },
}

/// One pipeline instance: shared fetchers, per-source circuit breakers and
/// the artifact sink. Everything here is Sync, so independent (area, date)
/// requests can run on the rayon pool without extra locking.
struct Pipeline {
    sources: Sources,
    store: ArtifactStore,
    fixture_dir: PathBuf,
    fetcher: Fetcher,
    browser_fetcher: Fetcher,
    tepco_breaker: CircuitBreaker,
    jepx_breaker: CircuitBreaker,
    occto_breaker: CircuitBreaker,
}

impl Pipeline {
    fn new(out_dir: PathBuf, fixture_dir: PathBuf) -> Result<Self> {
        // Breakers track failures across dates within one run; a down
        // publisher fails fast instead of eating the retry budget for
        // every date of a backfill.
        let breaker = || CircuitBreaker::new(5, Duration::from_secs(60));
        Ok(Self {
            sources: Sources::from_env(),
            store: ArtifactStore::new(out_dir),
            fixture_dir,
            fetcher: Fetcher::new(FetcherConfig::default())?,
            browser_fetcher: Fetcher::new(FetcherConfig::browser())?,
            tepco_breaker: breaker(),
            jepx_breaker: breaker(),
            occto_breaker: breaker(),
        })
    }

    fn fetch_demand(&self, area: Area, date: &str, mode: FetchMode) -> Result<PathBuf> {
        let series = match self.demand_series(area, date, mode) {
            Ok(series) => series,
            Err(e) if mode == FetchMode::Http => {
                warn!("live demand fetch for {area}/{date} failed, falling back to fixture: {e:#}");
                self.demand_series(area, date, FetchMode::Fixture)?
            }
            Err(e) => return Err(e),
        };

        if let Some(warning) = series.meta.as_ref().and_then(|m| m.warning.as_deref()) {
            warn!("demand {area}/{date}: {warning}");
        }
        let path = self
            .store
            .put("demand", Some(area.as_str()), &series.date, &series)?;
        info!(
            "demand {area}/{date}: {} hours -> {}",
            series.series.len(),
            path.display()
        );
        Ok(path)
    }

    fn demand_series(&self, area: Area, date: &str, mode: FetchMode) -> Result<DemandSeries> {
        match demand_adapter_for(mode, area) {
            DemandAdapterKind::Tepco => {
                let bytes = match mode {
                    FetchMode::Http => self
                        .tepco_breaker
                        .call(|| self.fetcher.fetch(&self.sources.tepco.url))?,
                    FetchMode::Fixture => read_fixture(&self.fixture_dir, "tepco-sample.csv")?,
                };
                Ok(TepcoAdapter::new().parse_csv(bytes.as_slice(), date)?)
            }
            DemandAdapterKind::Kansai => {
                let bytes = read_fixture(&self.fixture_dir, "kansai-sample.csv")?;
                Ok(KansaiAdapter::new().parse_csv(bytes.as_slice(), date)?)
            }
            DemandAdapterKind::OcctoArea => {
                let parsed = timeutil::parse_date(date)?;
                let url = occto_csv_url(&self.sources.occto.url, OcctoFeed::Reserve, parsed);
                let bytes = self
                    .occto_breaker
                    .call(|| self.browser_fetcher.fetch(&url))?;
                Ok(OcctoAdapter::new().parse_demand_csv(bytes.as_slice(), date, area)?)
            }
        }
    }

    fn fetch_prices(&self, area: Area, date: &str, mode: FetchMode) -> Result<PathBuf> {
        let adapter = JepxAdapter::new();
        let series: PriceSeries = match mode {
            FetchMode::Http => {
                let parsed = timeutil::parse_date(date)?;
                let url = jepx_spot_url(&self.sources.jepx.url, parsed);
                let live = self
                    .jepx_breaker
                    .call(|| self.fetcher.fetch(&url))
                    .map_err(anyhow::Error::from)
                    .and_then(|bytes| Ok(adapter.parse_csv(bytes.as_slice(), date, area)?));
                match live {
                    Ok(series) => series,
                    Err(e) => {
                        warn!(
                            "live JEPX fetch for {area}/{date} failed, falling back to fixture: {e:#}"
                        );
                        let bytes = read_fixture(&self.fixture_dir, "jepx-sample.csv")?;
                        adapter.parse_csv(bytes.as_slice(), date, area)?
                    }
                }
            }
            FetchMode::Fixture => {
                let bytes = read_fixture(&self.fixture_dir, "jepx-sample.csv")?;
                adapter.parse_csv(bytes.as_slice(), date, area)?
            }
        };

        if let Some(warning) = series.meta.as_ref().and_then(|m| m.warning.as_deref()) {
            warn!("prices {area}/{date}: {warning}");
        }
        let path = self
            .store
            .put("spot", Some(area.as_str()), &series.date, &series)?;
        info!(
            "prices {area}/{date}: {} hours -> {}",
            series.price_yen_per_kwh.len(),
            path.display()
        );
        Ok(path)
    }

    fn fetch_reserve(&self, date: &str, mode: FetchMode) -> Result<PathBuf> {
        let adapter = OcctoAdapter::new();
        let series = match mode {
            FetchMode::Http => {
                let parsed = timeutil::parse_date(date)?;
                let url = occto_csv_url(&self.sources.occto.url, OcctoFeed::Reserve, parsed);
                let live = self
                    .occto_breaker
                    .call(|| self.browser_fetcher.fetch(&url))
                    .map_err(anyhow::Error::from)
                    .and_then(|bytes| Ok(adapter.parse_reserve_csv(bytes.as_slice(), date)?));
                match live {
                    Ok(series) => series,
                    Err(e) => {
                        warn!("live reserve fetch for {date} failed, falling back to fixture: {e:#}");
                        let bytes = read_fixture(&self.fixture_dir, "occto-sample.csv")?;
                        adapter.parse_reserve_csv(bytes.as_slice(), date)?
                    }
                }
            }
            FetchMode::Fixture => {
                let bytes = read_fixture(&self.fixture_dir, "occto-sample.csv")?;
                adapter.parse_reserve_csv(bytes.as_slice(), date)?
            }
        };

        let path = self.store.put("reserve", None, &series.date, &series)?;
        info!(
            "reserve {date}: {} areas -> {}",
            series.areas.len(),
            path.display()
        );
        Ok(path)
    }

    fn fetch_generation(&self, area: Area, date: &str, mode: FetchMode) -> Result<PathBuf> {
        let adapter = OcctoGenerationAdapter::new();
        let bytes = match mode {
            FetchMode::Http => {
                let parsed = timeutil::parse_date(date)?;
                let url = occto_csv_url(&self.sources.occto.url, OcctoFeed::GenerationMix, parsed);
                self.occto_breaker
                    .call(|| self.browser_fetcher.fetch(&url))?
            }
            FetchMode::Fixture => read_fixture(&self.fixture_dir, "occto-generation-sample.csv")?,
        };
        let series = adapter.parse_csv(bytes.as_slice(), date, area)?;

        let path = self
            .store
            .put("generation", Some(area.as_str()), &series.date, &series)?;
        if let Some(meta) = &series.meta {
            info!(
                "generation {area}/{date}: renewable {:.1}%, carbon {:.1} gCO2/kWh, peak solar {:.1} MW -> {}",
                meta.avg_renewable_pct,
                meta.avg_carbon_gco2_kwh,
                meta.peak_solar_mw,
                path.display()
            );
        }
        Ok(path)
    }

    fn estimate_generation(&self, area: Area, date: &str) -> Result<PathBuf> {
        let demand: DemandSeries = serde_json::from_value(
            self.store
                .get("demand", Some(area.as_str()), date)
                .context("run fetch-demand for this date first")?,
        )?;
        let prices: PriceSeries = serde_json::from_value(
            self.store
                .get("spot", Some(area.as_str()), date)
                .context("run fetch-prices for this date first")?,
        )?;

        let estimator = GenerationEstimator::default();
        let series = estimator.estimate(&demand, &prices)?;

        let path = self
            .store
            .put("generation", Some(area.as_str()), &series.date, &series)?;
        if let Some(meta) = &series.meta {
            info!(
                "estimated generation {area}/{date}: renewable {:.1}%, carbon {:.1} gCO2/kWh -> {}",
                meta.avg_renewable_pct,
                meta.avg_carbon_gco2_kwh,
                path.display()
            );
        }
        Ok(path)
    }
}

fn read_fixture(dir: &Path, name: &str) -> Result<Vec<u8>> {
    let path = dir.join(name);
    std::fs::read(&path).with_context(|| format!("failed to read fixture {path:?}"))
}

fn mode_for(use_http: bool) -> FetchMode {
    if use_http {
        FetchMode::Http
    } else {
        FetchMode::Fixture
    }
}

fn backfill(pipeline: &Pipeline, from: &str, to: &str, mode: FetchMode) -> Result<()> {
    let start = timeutil::parse_date(from)?;
    let end = timeutil::parse_date(to)?;
    if start > end {
        bail!("backfill range is inverted: {from} > {to}");
    }

    let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let pb = ProgressBar::new(dates.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
            .unwrap(),
    );

    dates.par_iter().for_each(|date| {
        let date = date.format("%Y-%m-%d").to_string();
        pb.set_message(date.clone());

        let mut jobs: Vec<(String, Result<PathBuf>)> = Vec::new();
        for area in [Area::Tokyo, Area::Kansai] {
            jobs.push((
                format!("demand {area}/{date}"),
                pipeline.fetch_demand(area, &date, mode),
            ));
            jobs.push((
                format!("prices {area}/{date}"),
                pipeline.fetch_prices(area, &date, mode),
            ));
        }
        jobs.push((format!("reserve {date}"), pipeline.fetch_reserve(&date, mode)));

        for (label, result) in jobs {
            match result {
                Ok(_) => {
                    succeeded.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::SeqCst);
                    warn!("{label} failed: {e:#}");
                }
            }
        }
        pb.inc(1);
    });

    pb.finish_with_message("done");
    info!(
        "backfill complete: {} artifacts written, {} failed",
        succeeded.load(Ordering::SeqCst),
        failed.load(Ordering::SeqCst)
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let pipeline = Pipeline::new(cli.out_dir, cli.fixture_dir)?;

    match cli.command {
        Command::FetchDemand {
            area,
            date,
            use_http,
        } => {
            timeutil::parse_date(&date)?;
            pipeline.fetch_demand(area, &date, mode_for(use_http))?;
        }
        Command::FetchPrices {
            area,
            date,
            use_http,
        } => {
            timeutil::parse_date(&date)?;
            pipeline.fetch_prices(area, &date, mode_for(use_http))?;
        }
        Command::FetchReserve { date, use_http } => {
            timeutil::parse_date(&date)?;
            pipeline.fetch_reserve(&date, mode_for(use_http))?;
        }
        Command::FetchGeneration {
            area,
            date,
            use_http,
        } => {
            timeutil::parse_date(&date)?;
            pipeline.fetch_generation(area, &date, mode_for(use_http))?;
        }
        Command::EstimateGeneration { area, date } => {
            timeutil::parse_date(&date)?;
            pipeline.estimate_generation(area, &date)?;
        }
        Command::Backfill { from, to, use_http } => {
            backfill(&pipeline, &from, &to, mode_for(use_http))?;
        }
    }

    Ok(())
}
