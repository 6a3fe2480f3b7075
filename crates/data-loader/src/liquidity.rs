// In crates/data-loader/src/liquidity.rs

use app_config::types::{LiquiditySettings, VolumeMeasure};
use core_types::{Bar, DateRange, Pair, Series, Timeframe};
use futures::future;
use tracing::{debug, info};

use crate::DataLoader;
use crate::error::LoaderError;

/// Eligibility rule: the trailing average volume must exceed `floor`.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityFilter {
    pub window: usize,
    pub floor: f64,
    pub measure: VolumeMeasure,
}

impl From<&LiquiditySettings> for LiquidityFilter {
    fn from(settings: &LiquiditySettings) -> Self {
        Self {
            window: settings.window,
            floor: settings.volume_floor,
            measure: settings.measure,
        }
    }
}

/// Why a candidate pair was left out.
#[derive(Debug, Clone, PartialEq)]
pub enum Ineligible {
    BelowFloor { average: f64 },
    InsufficientBars { available: usize, required: usize },
    LoadFailed(LoaderError),
}

#[derive(Debug, Clone, Default)]
pub struct LiquiditySelection {
    /// Qualifying pairs with their trailing average volume, in candidate order.
    pub eligible: Vec<(Pair, f64)>,
    pub rejected: Vec<(Pair, Ineligible)>,
}

impl LiquiditySelection {
    pub fn pairs(&self) -> Vec<Pair> {
        self.eligible.iter().map(|(pair, _)| pair.clone()).collect()
    }
}

impl LiquidityFilter {
    /// Applies the filter to one series.
    ///
    /// Only observed bars count, so forward-filled bars never dilute the average.
    pub fn assess(&self, series: &Series) -> Result<f64, Ineligible> {
        let observed: Vec<&Bar> = series.observed_bars().collect();
        let required = self.window.max(1);
        if observed.len() < required {
            return Err(Ineligible::InsufficientBars { available: observed.len(), required });
        }

        let trailing = &observed[observed.len() - required..];
        let total: f64 = trailing
            .iter()
            .map(|bar| match self.measure {
                VolumeMeasure::Base => bar.volume_f64(),
                VolumeMeasure::Quote => bar.quote_volume(),
            })
            .sum();
        let average = total / required as f64;

        if average > self.floor {
            Ok(average)
        } else {
            Err(Ineligible::BelowFloor { average })
        }
    }
}

impl DataLoader {
    /// Loads every candidate and keeps those whose trailing volume clears the floor.
    ///
    /// A pair whose data cannot be loaded is reported as ineligible rather than
    /// failing the whole selection.
    pub async fn select_liquid_pairs(
        &self,
        candidates: &[Pair],
        timeframe: Timeframe,
        range: DateRange,
        filter: &LiquidityFilter,
    ) -> LiquiditySelection {
        let loads = future::join_all(candidates.iter().map(|pair| self.load(pair, timeframe, range))).await;

        let mut selection = LiquiditySelection::default();
        for (pair, loaded) in candidates.iter().zip(loads) {
            let verdict = loaded
                .map_err(Ineligible::LoadFailed)
                .and_then(|series| filter.assess(&series));
            match verdict {
                Ok(average) => selection.eligible.push((pair.clone(), average)),
                Err(reason) => {
                    debug!(pair = %pair, ?reason, "Pair is not eligible");
                    selection.rejected.push((pair.clone(), reason));
                }
            }
        }

        info!(
            candidates = candidates.len(),
            eligible = selection.eligible.len(),
            floor = filter.floor,
            window = filter.window,
            "Liquidity selection finished"
        );
        selection
    }
}
