//! Dollar-cost-averaging backtest simulator.
//!
//! Simulates daily fixed contributions into weighted portfolios, a
//! cash+interest baseline, and single-instrument benchmark trackers, all
//! on one shared date index. The date index is the intersection of every
//! requested symbol's trading days; a symbol with no overlap at all makes
//! the run fatal rather than silently shrinking the basket to nothing.

use crate::domain::allocation::PortfolioAllocation;
use crate::domain::error::RiskpulseError;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::series::{intersection_index, PriceSeries};
use chrono::NaiveDate;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Backtest environment settings.
#[derive(Debug, Clone)]
pub struct DcaConfig {
    /// Lump sum invested on the first day.
    pub initial: f64,
    /// Fresh cash added every trading day.
    pub contribution: f64,
    /// Annual interest rate on the cash baseline, as a fraction.
    pub annual_cash_rate: f64,
    /// Use dividend/split-adjusted closes instead of raw closes.
    pub reinvest_dividends: bool,
    pub start_date: NaiveDate,
}

/// Per-symbol daily prices on one shared, gap-free date index.
#[derive(Debug, Clone)]
pub struct PriceFrame {
    pub dates: Vec<NaiveDate>,
    columns: Vec<(String, Vec<f64>)>,
}

impl PriceFrame {
    /// Align the given series onto the intersection of their date sets,
    /// keeping only dates on or after `start_date`.
    pub fn intersect(
        series: &[PriceSeries],
        start_date: NaiveDate,
    ) -> Result<PriceFrame, RiskpulseError> {
        if series.is_empty() {
            return Err(RiskpulseError::EmptyDataset {
                reason: "no instruments requested".into(),
            });
        }
        for s in series {
            if s.is_empty() {
                return Err(RiskpulseError::DataGap {
                    symbol: s.symbol.clone(),
                });
            }
        }
        let refs: Vec<&PriceSeries> = series.iter().collect();
        let dates: Vec<NaiveDate> = intersection_index(&refs)
            .into_iter()
            .filter(|d| *d >= start_date)
            .collect();
        if dates.is_empty() {
            return Err(RiskpulseError::NoOverlap {
                symbols: series.len(),
            });
        }
        let columns = series
            .iter()
            .map(|s| (s.symbol.clone(), s.reindex(&dates)))
            .collect();
        Ok(PriceFrame { dates, columns })
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, v)| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Cash,
    Portfolio,
    Benchmark,
}

/// One simulated equity curve plus its metrics bundle.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub kind: TrackKind,
    pub equity: Vec<f64>,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug)]
pub struct BacktestResult {
    pub dates: Vec<NaiveDate>,
    pub tracks: Vec<Track>,
}

impl BacktestResult {
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }
}

/// Run the DCA simulation over every portfolio and benchmark.
///
/// Inert (zero-weight) portfolios are skipped, not errors. Every
/// portfolio constituent and benchmark symbol must have a column in the
/// frame; the frame builder guarantees that for the requested basket.
pub fn run_backtest(
    frame: &PriceFrame,
    portfolios: &[PortfolioAllocation],
    benchmarks: &[String],
    config: &DcaConfig,
) -> Result<BacktestResult, RiskpulseError> {
    let mut tracks = Vec::new();

    tracks.push(make_track(
        "cash".to_string(),
        TrackKind::Cash,
        cash_track(frame.len(), config),
        frame,
        config,
    ));

    for portfolio in portfolios {
        if portfolio.is_empty() {
            continue;
        }
        let mut equity = vec![0.0; frame.len()];
        for (symbol, weight) in portfolio.weights() {
            let prices = frame
                .column(symbol)
                .ok_or_else(|| RiskpulseError::DataGap {
                    symbol: symbol.clone(),
                })?;
            accumulate_shares(
                &mut equity,
                prices,
                config.initial * weight,
                config.contribution * weight,
            );
        }
        tracks.push(make_track(
            portfolio.name.clone(),
            TrackKind::Portfolio,
            equity,
            frame,
            config,
        ));
    }

    for symbol in benchmarks {
        let prices = frame
            .column(symbol)
            .ok_or_else(|| RiskpulseError::DataGap {
                symbol: symbol.clone(),
            })?;
        let mut equity = vec![0.0; frame.len()];
        accumulate_shares(&mut equity, prices, config.initial, config.contribution);
        tracks.push(make_track(
            symbol.clone(),
            TrackKind::Benchmark,
            equity,
            frame,
            config,
        ));
    }

    Ok(BacktestResult {
        dates: frame.dates.clone(),
        tracks,
    })
}

/// Cash baseline: geometric daily compounding of the annual rate over a
/// balance that receives the contribution every day.
fn cash_track(days: usize, config: &DcaConfig) -> Vec<f64> {
    let daily_rate = (1.0 + config.annual_cash_rate).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0;
    let mut balance = config.initial;
    let mut equity = Vec::with_capacity(days);
    for _ in 0..days {
        balance = balance * (1.0 + daily_rate) + config.contribution;
        equity.push(balance);
    }
    equity
}

/// Add one constituent's market value into `equity`: the initial
/// allocation buys shares at the first price, every day's allocation buys
/// shares at that day's price, and shares accumulate additively.
fn accumulate_shares(equity: &mut [f64], prices: &[f64], initial_alloc: f64, daily_alloc: f64) {
    let Some(&first_price) = prices.first() else {
        return;
    };
    let initial_shares = initial_alloc / first_price;
    let mut cumulative_shares = 0.0;
    for (value, &price) in equity.iter_mut().zip(prices) {
        cumulative_shares += daily_alloc / price;
        *value += (initial_shares + cumulative_shares) * price;
    }
}

fn make_track(
    name: String,
    kind: TrackKind,
    equity: Vec<f64>,
    frame: &PriceFrame,
    config: &DcaConfig,
) -> Track {
    let metrics = PerformanceMetrics::compute(
        &frame.dates,
        &equity,
        config.initial,
        config.contribution,
        config.annual_cash_rate,
    );
    Track {
        name,
        kind,
        equity,
        metrics,
    }
}
