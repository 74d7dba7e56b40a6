use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;

use settlement_calculator::models::{PricesRef, SettlementRequest};
use settlement_calculator::{calculate, DataLoader};

#[derive(Parser)]
#[command(name = "settlement_calculator")]
#[command(about = "Settle an hourly consumption profile against JEPX spot prices")]
struct Args {
    /// Path to the consumption profile JSON (array of {ts, kwh})
    #[arg(long)]
    profile: PathBuf,

    /// Price area
    #[arg(long, default_value = "tokyo")]
    area: String,

    /// Price date (YYYY-MM-DD)
    #[arg(long)]
    date: String,

    /// Fraction of consumption offset by on-site PV (0-1)
    #[arg(long, default_value = "0.0")]
    pv_offset: f64,

    /// Root of the artifact store holding spot-{date}.json files
    #[arg(long, default_value = "public/data/jp")]
    prices_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    output: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    chrono::NaiveDate::parse_from_str(&args.date, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("invalid date {:?} (expected YYYY-MM-DD)", args.date))?;

    let profile = DataLoader::load_profile(&args.profile)?;
    info!("loaded {} hourly profile points", profile.len());

    let loader = DataLoader::new(&args.prices_dir);
    let (prices, source) = loader.load_prices(&args.area, &args.date)?;
    info!("loaded {} hourly price points", prices.len());

    let request = SettlementRequest {
        profile,
        prices: PricesRef {
            area: args.area.clone(),
            date: args.date.clone(),
        },
        pv_offset_pct: args.pv_offset,
    };

    let result = calculate(&request, &prices, source)?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Summary => {
            println!(
                "{} → {}: {} kWh, {} JPY ({}% PV offset, {} area)",
                result.period.from,
                result.period.to,
                result.totals.kwh,
                result.totals.cost_yen,
                result.assumptions.pv_offset_pct * 100.0,
                result.assumptions.area
            );
        }
    }

    Ok(())
}
