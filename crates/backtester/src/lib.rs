// In crates/backtester/src/lib.rs

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use analytics::{CostModel, Evaluator, VectorizedEvaluator};
use app_config::types::CostSettings;
use core_types::{CacheKey, DateRange, Pair, Series, StrategyConfig, Timeframe};
use data_loader::DataLoader;
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use strategies::{Strategy, strategy_for};
use tracing::{error, info, warn};

pub mod error;
pub mod ranking;
pub mod types;

// Re-export the most important types for easy access.
pub use error::RunError;
pub use ranking::{RankedRun, calculate_score, rank_runs};
pub use types::{RunReport, RunResult, RunSpec, RunSuccess};

/// Drives many independent backtests through load → signals → evaluation.
pub struct BacktestCoordinator {
    loader: DataLoader,
    evaluator: Arc<dyn Evaluator>,
    costs: CostSettings,
}

/// A run whose config passed validation and whose data is loaded.
struct Job {
    strategy: Box<dyn Strategy>,
    config: Arc<StrategyConfig>,
    costs: CostModel,
    series: Arc<Series>,
}

enum Stage {
    Done(Result<RunSuccess, RunError>),
    Pending(Job),
}

impl BacktestCoordinator {
    /// `costs` are the defaults every strategy config may override.
    pub fn new(loader: DataLoader, costs: CostSettings) -> Self {
        Self {
            loader,
            evaluator: Arc::new(VectorizedEvaluator),
            costs,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn loader(&self) -> &DataLoader {
        &self.loader
    }

    /// Runs every spec and returns exactly one result per spec, in the given order.
    ///
    /// Configs are checked before anything is fetched; a spec that fails the
    /// check never reaches the loader. Data for distinct keys loads concurrently,
    /// then signal generation and evaluation fan out over the rayon pool.
    pub async fn run(&self, specs: Vec<RunSpec>) -> RunReport {
        info!(runs = specs.len(), "Starting backtest run.");

        let prepared: Vec<Result<(Box<dyn Strategy>, CostModel), RunError>> =
            specs.iter().map(|spec| self.prepare(spec)).collect();

        // One load per distinct key, however many specs share it.
        let mut slots: HashMap<CacheKey, usize> = HashMap::new();
        let mut requests: Vec<(Pair, Timeframe, DateRange)> = Vec::new();
        let mut slot_of = Vec::with_capacity(specs.len());
        for (spec, prepared) in specs.iter().zip(&prepared) {
            if prepared.is_err() {
                slot_of.push(None);
                continue;
            }
            let key = CacheKey::new(spec.pair.clone(), spec.timeframe, spec.range);
            let slot = *slots.entry(key).or_insert_with(|| {
                requests.push((spec.pair.clone(), spec.timeframe, spec.range));
                requests.len() - 1
            });
            slot_of.push(Some(slot));
        }
        info!(
            rejected = slot_of.iter().filter(|s| s.is_none()).count(),
            distinct_series = requests.len(),
            "Loading market data."
        );
        let loaded = self.loader.load_many(&requests).await;

        let mut results: Vec<RunResult> = Vec::with_capacity(specs.len());
        let mut stages: Vec<Stage> = Vec::with_capacity(specs.len());
        for ((spec, prepared), slot) in specs.into_iter().zip(prepared).zip(slot_of) {
            let config = Arc::new(spec.strategy);
            let stage = match (prepared, slot) {
                (Err(e), _) => Stage::Done(Err(e)),
                (Ok(_), None) => Stage::Done(Err(RunError::Internal("run was never scheduled".to_string()))),
                (Ok((strategy, costs)), Some(slot)) => match &loaded[slot] {
                    Ok(series) => Stage::Pending(Job {
                        strategy,
                        config: Arc::clone(&config),
                        costs,
                        series: Arc::clone(series),
                    }),
                    Err(e) => Stage::Done(Err(e.clone().into())),
                },
            };
            stages.push(stage);
            results.push(RunResult {
                pair: spec.pair,
                timeframe: spec.timeframe,
                range: spec.range,
                strategy: config.name.clone(),
                config,
                outcome: Err(RunError::Internal("run did not complete".to_string())),
            });
        }

        let evaluator = Arc::clone(&self.evaluator);
        let count = stages.len();
        let outcomes = tokio::task::spawn_blocking(move || {
            stages
                .into_par_iter()
                .map(|stage| match stage {
                    Stage::Done(outcome) => outcome,
                    Stage::Pending(job) => execute(job, evaluator.as_ref()),
                })
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "Evaluation pool failed.");
            vec![Err(RunError::Internal(e.to_string())); count]
        });

        for (result, outcome) in results.iter_mut().zip(outcomes) {
            if let Err(e) = &outcome {
                warn!(
                    pair = %result.pair,
                    timeframe = %result.timeframe,
                    strategy = %result.config.label(),
                    kind = e.kind(),
                    error = %e,
                    "Run failed."
                );
            }
            result.outcome = outcome;
        }

        let report = RunReport::new(results);
        info!(
            succeeded = report.successes().count(),
            failed = report.failures().count(),
            "Backtest run finished."
        );
        report
    }

    /// Everything that can be checked without market data.
    fn prepare(&self, spec: &RunSpec) -> Result<(Box<dyn Strategy>, CostModel), RunError> {
        let strategy = strategy_for(&spec.strategy.name)?;
        strategy.validate(&spec.strategy, spec.timeframe)?;
        let costs = self.cost_model(&spec.strategy)?;
        Ok((strategy, costs))
    }

    fn cost_model(&self, config: &StrategyConfig) -> Result<CostModel, RunError> {
        let initial_cash = Decimal::from_f64(self.costs.initial_cash)
            .ok_or_else(|| RunError::Config(format!("initial cash {} is not a number", self.costs.initial_cash)))?;
        Ok(CostModel::new(
            config.fee_rate.unwrap_or(self.costs.fee_rate),
            config.slippage_rate.unwrap_or(self.costs.slippage_rate),
            initial_cash,
        )?)
    }
}

/// Signal generation and evaluation for one loaded run.
///
/// A panicking strategy fails only its own run.
fn execute(job: Job, evaluator: &dyn Evaluator) -> Result<RunSuccess, RunError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let signals = job.strategy.generate_signals(&job.series, &job.config)?;
        let report = evaluator.evaluate(&job.series, &signals, &job.costs)?;
        Ok(RunSuccess { report, signals })
    }))
    .unwrap_or_else(|_| Err(RunError::Internal(format!("{} panicked", job.strategy.name()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::{MarketDataSource, SourceError};
    use app_config::types::{FillPolicy, LoaderSettings};
    use async_trait::async_trait;
    use cache_store::Cache;
    use core_types::Bar;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STEP: i64 = 60_000;

    /// Rising prices, one bar per minute. Pairs in `unknown` are rejected by the "exchange".
    struct MockSource {
        calls: AtomicUsize,
        requested: Mutex<Vec<Pair>>,
        unknown: Vec<Pair>,
    }

    impl MockSource {
        fn new(unknown: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
                unknown: unknown.iter().map(Pair::new).collect(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataSource for MockSource {
        async fn fetch_bars(
            &self,
            pair: &Pair,
            timeframe: Timeframe,
            range: DateRange,
        ) -> api_client::Result<Vec<Bar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(pair.clone());
            if self.unknown.contains(pair) {
                return Err(SourceError::Api { code: -1121, msg: "Invalid symbol.".to_string() });
            }
            let step = timeframe.duration_ms();
            let first = (range.start + step - 1) / step * step;
            Ok((0..)
                .map(|i| first + i * step)
                .take_while(|t| *t < range.end)
                .map(|t| {
                    let price = Decimal::from(100 + t / step);
                    Bar {
                        open_time: t,
                        open: price,
                        high: price + Decimal::ONE,
                        low: price - Decimal::ONE,
                        close: price,
                        volume: Decimal::from(10),
                    }
                })
                .collect())
        }
    }

    fn loader_settings() -> LoaderSettings {
        LoaderSettings {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            fetch_timeout_secs: 5,
            max_concurrent_fetches: 4,
            fill_policy: FillPolicy::Reject,
        }
    }

    async fn coordinator(source: Arc<MockSource>, dir: &std::path::Path) -> BacktestCoordinator {
        let cache = Cache::open(dir).await.unwrap();
        let loader = DataLoader::new(source, cache, &loader_settings());
        BacktestCoordinator::new(loader, CostSettings::default())
    }

    fn crossover(short: i64, long: i64) -> StrategyConfig {
        let params: toml::Table = toml::from_str(&format!("short_window = {short}\nlong_window = {long}")).unwrap();
        StrategyConfig::new("crossover", params)
    }

    fn spec(pair: &str, bars: i64, strategy: StrategyConfig) -> RunSpec {
        RunSpec::new(
            Pair::new(pair),
            "1m".parse().unwrap(),
            DateRange::new(0, bars * STEP).unwrap(),
            strategy,
        )
    }

    #[tokio::test]
    async fn ramp_crossover_holds_one_long_trade() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new(&[]));
        let coordinator = coordinator(source, dir.path()).await;

        let report = coordinator.run(vec![spec("BTCUSDT", 60, crossover(5, 20))]).await;

        assert_eq!(report.len(), 1);
        let success = report.results()[0].outcome.as_ref().unwrap();
        assert_eq!(success.signals.len(), 60);
        assert_eq!(success.signals.first_active(), Some(19));
        assert_eq!(success.report.total_trades, 1);
        assert!(success.report.net_pnl_percentage > 0.0);
    }

    #[tokio::test]
    async fn a_failing_pair_does_not_affect_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new(&["DELISTED"]));
        let coordinator = coordinator(source, dir.path()).await;

        let report = coordinator
            .run(vec![
                spec("DELISTED", 60, crossover(5, 20)),
                spec("BTCUSDT", 60, crossover(5, 20)),
            ])
            .await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.successes().count(), 1);
        assert_eq!(report.failures().count(), 1);
        let failed = &report.results()[0];
        assert_eq!(failed.pair, Pair::new("DELISTED"));
        assert!(matches!(failed.error(), Some(RunError::SourceUnavailable(_))));
        assert!(report.results()[1].is_success());
    }

    #[tokio::test]
    async fn config_errors_are_reported_before_any_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new(&[]));
        let coordinator = coordinator(source.clone(), dir.path()).await;

        let mut expensive = crossover(5, 20);
        expensive.fee_rate = Some(1.5);
        let report = coordinator
            .run(vec![
                spec("BTCUSDT", 60, StrategyConfig::new("no_such_strategy", toml::Table::new())),
                spec("BTCUSDT", 60, crossover(20, 5)),
                spec("BTCUSDT", 60, expensive),
            ])
            .await;

        assert_eq!(source.calls(), 0);
        assert_eq!(report.len(), 3);
        assert!(report.results().iter().all(|r| r.error().map(RunError::kind) == Some("config")));
    }

    #[tokio::test]
    async fn results_follow_the_requested_order_and_share_loads() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new(&[]));
        let coordinator = coordinator(source.clone(), dir.path()).await;

        let specs = vec![
            spec("BTCUSDT", 60, crossover(5, 20)),
            spec("ETHUSDT", 60, crossover(3, 10)),
            spec("BTCUSDT", 60, crossover(3, 10)),
            spec("BTCUSDT", 60, crossover(10, 30)),
        ];
        let expected: Vec<(Pair, String)> = specs.iter().map(|s| (s.pair.clone(), s.strategy.label())).collect();

        let report = coordinator.run(specs).await;

        let got: Vec<(Pair, String)> = report
            .results()
            .iter()
            .map(|r| (r.pair.clone(), r.config.label()))
            .collect();
        assert_eq!(got, expected);
        assert_eq!(report.successes().count(), 4);
        // One page per distinct (pair, timeframe, range).
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn short_series_fail_with_a_strategy_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new(&[]));
        let coordinator = coordinator(source, dir.path()).await;

        let report = coordinator.run(vec![spec("BTCUSDT", 10, crossover(5, 20))]).await;

        let error = report.results()[0].error().unwrap();
        assert_eq!(error.kind(), "strategy");
    }

    #[tokio::test]
    async fn ranking_only_includes_successful_runs() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new(&["DELISTED"]));
        let coordinator = coordinator(source, dir.path()).await;

        let report = coordinator
            .run(vec![
                spec("DELISTED", 60, crossover(5, 20)),
                spec("BTCUSDT", 60, crossover(5, 20)),
                spec("BTCUSDT", 60, crossover(3, 10)),
            ])
            .await;

        let ranked = rank_runs(&report, 1);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.result.pair == Pair::new("BTCUSDT")));
        assert!(ranked[0].score >= ranked[1].score);
    }
}
