pub mod calculator;
pub mod data_loader;
pub mod models;

pub use calculator::{calculate, SettlementError};
pub use data_loader::DataLoader;
pub use models::{
    Assumptions, HourlyBreakdown, Period, PricePoint, PriceSource, ProfilePoint, SettlementRequest,
    SettlementResult, Totals,
};
