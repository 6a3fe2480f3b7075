// In crates/strategies/src/factory.rs

use crate::error::{Error, Result};
use crate::{Crossover, MeanReversionBand, MultiHorizon, Strategy};

/// Every name `strategy_for` accepts.
pub const STRATEGY_NAMES: &[&str] = &["crossover", "mean_reversion_band", "multi_horizon"];

/// Looks up the strategy registered under `name`.
pub fn strategy_for(name: &str) -> Result<Box<dyn Strategy>> {
    let strategy: Box<dyn Strategy> = match name {
        "crossover" => Box::new(Crossover),
        "mean_reversion_band" => Box::new(MeanReversionBand),
        "multi_horizon" => Box::new(MultiHorizon),
        unknown => return Err(Error::UnknownStrategy(unknown.to_string())),
    };
    Ok(strategy)
}
