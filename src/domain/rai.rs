//! Risk Appetite Index composition and rebalance signalling.
//!
//! Pipeline: direction-signed 252-day z-scores per feature, weighted
//! composite with missing-feature rescaling, trailing-window percentile
//! rank, strategy-profile target-weight mapping, execution-day gating.

use crate::domain::error::RiskpulseError;
use crate::domain::feature::{Feature, FeatureFrame, FEATURE_COUNT};
use crate::domain::rolling::{rolling_mean, rolling_std_pop};
use chrono::{Datelike, NaiveDate, Weekday};

/// Trailing window for z-score normalization.
pub const ZSCORE_WINDOW: usize = 252;
/// Trailing window for the percentile rank (~two trading years).
pub const PERCENTILE_WINDOW: usize = 504;
/// RAI is undefined on dates with fewer defined feature z-scores than this.
pub const MIN_FEATURES: usize = 4;
/// Target-vs-current deltas inside this band are a hold, not a trade.
pub const HOLD_BAND: f64 = 0.01;

/// Direction-signed z-scores over a trailing window, one column per
/// feature, same shape as the input frame.
pub fn zscore_frame(features: &FeatureFrame) -> FeatureFrame {
    let mut columns: [Vec<f64>; FEATURE_COUNT] = Default::default();
    for (slot, feature) in columns.iter_mut().zip(Feature::ALL) {
        let signed: Vec<f64> = features
            .column(feature)
            .iter()
            .map(|v| feature.direction() * v)
            .collect();
        let mean = rolling_mean(&signed, ZSCORE_WINDOW);
        let std = rolling_std_pop(&signed, ZSCORE_WINDOW);
        *slot = (0..signed.len())
            .map(|i| {
                // zero dispersion gives no usable score, not an infinity
                if std[i] == 0.0 {
                    f64::NAN
                } else {
                    (signed[i] - mean[i]) / std[i]
                }
            })
            .collect();
    }
    FeatureFrame::with_columns(features.dates.clone(), columns)
}

/// The daily composite RAI scalar on the signal instrument's date index.
#[derive(Debug, Clone)]
pub struct RaiSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    /// How many of the eight features were defined each date.
    pub features_used: Vec<usize>,
}

impl RaiSeries {
    /// Weighted sum of available z-scores per date, with the restricted
    /// weight vector rescaled so its absolute sum matches the full
    /// vector's. Dates missing from the z-score frame, or with fewer than
    /// [`MIN_FEATURES`] defined features, are NAN.
    pub fn compose(zscores: &FeatureFrame, signal_dates: &[NaiveDate]) -> RaiSeries {
        let full_abs_weight: f64 = Feature::ALL.iter().map(|f| f.base_weight().abs()).sum();

        let mut values = Vec::with_capacity(signal_dates.len());
        let mut features_used = Vec::with_capacity(signal_dates.len());

        for &date in signal_dates {
            let Ok(row) = zscores.dates.binary_search(&date) else {
                values.push(f64::NAN);
                features_used.push(0);
                continue;
            };

            let available: Vec<(Feature, f64)> = Feature::ALL
                .iter()
                .filter_map(|&f| {
                    let z = zscores.column(f)[row];
                    (!z.is_nan()).then_some((f, z))
                })
                .collect();

            features_used.push(available.len());
            if available.len() < MIN_FEATURES {
                values.push(f64::NAN);
                continue;
            }

            let avail_abs_weight: f64 = available.iter().map(|(f, _)| f.base_weight().abs()).sum();
            let rescale = full_abs_weight / avail_abs_weight;
            values.push(
                available
                    .iter()
                    .map(|(f, z)| z * f.base_weight() * rescale)
                    .sum(),
            );
        }

        RaiSeries {
            dates: signal_dates.to_vec(),
            values,
            features_used,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Percentile rank of each value within its historical window: the fraction
/// of the window (self-inclusive, ≤ comparison) at or below the value.
///
/// Uses the trailing [`PERCENTILE_WINDOW`] once that many observations
/// exist; before that, an expanding window over all observations so far.
/// NAN input dates stay NAN; NAN entries inside a window count toward its
/// length but never satisfy the comparison.
pub fn percentile_rank(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, &current)| {
            if current.is_nan() {
                return f64::NAN;
            }
            let start = (i + 1).saturating_sub(PERCENTILE_WINDOW);
            let window = &values[start..=i];
            let at_or_below = window.iter().filter(|&&v| v <= current).count();
            at_or_below as f64 / window.len() as f64
        })
        .collect()
}

/// Investor stance controlling the percentile-to-weight step function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyProfile {
    Defensive,
    Neutral,
    Aggressive,
}

impl StrategyProfile {
    /// Target equity weight for a percentile rank. Five buckets, lower
    /// bucket applies exactly at a boundary; non-decreasing in `q`.
    pub fn target_weight(&self, q: f64) -> f64 {
        let steps = match self {
            StrategyProfile::Defensive => [0.20, 0.40, 0.60, 0.80, 1.00],
            StrategyProfile::Neutral => [0.40, 0.55, 0.70, 0.85, 1.00],
            StrategyProfile::Aggressive => [0.60, 0.70, 0.80, 0.90, 1.00],
        };
        if q <= 0.10 {
            steps[0]
        } else if q <= 0.25 {
            steps[1]
        } else if q <= 0.50 {
            steps[2]
        } else if q <= 0.75 {
            steps[3]
        } else {
            steps[4]
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrategyProfile::Defensive => "defensive",
            StrategyProfile::Neutral => "neutral",
            StrategyProfile::Aggressive => "aggressive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "defensive" => Some(StrategyProfile::Defensive),
            "neutral" => Some(StrategyProfile::Neutral),
            "aggressive" => Some(StrategyProfile::Aggressive),
            _ => None,
        }
    }
}

/// How often rebalance instructions actually execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceFrequency {
    Daily,
    WeeklyFriday,
    MonthEnd,
}

impl RebalanceFrequency {
    /// Whether `date` is an execution day within the trading calendar
    /// `all_dates` (month-end means the last trading day of its month).
    pub fn is_execution_day(&self, date: NaiveDate, all_dates: &[NaiveDate]) -> bool {
        match self {
            RebalanceFrequency::Daily => true,
            RebalanceFrequency::WeeklyFriday => date.weekday() == Weekday::Fri,
            RebalanceFrequency::MonthEnd => all_dates
                .iter()
                .filter(|d| d.year() == date.year() && d.month() == date.month())
                .max()
                .is_some_and(|last| *last == date),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RebalanceFrequency::Daily => "daily",
            RebalanceFrequency::WeeklyFriday => "weekly-friday",
            RebalanceFrequency::MonthEnd => "month-end",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Some(RebalanceFrequency::Daily),
            "weekly-friday" | "friday" => Some(RebalanceFrequency::WeeklyFriday),
            "month-end" | "monthly" => Some(RebalanceFrequency::MonthEnd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Hold,
    Buy,
    Sell,
}

impl SignalAction {
    fn from_delta(delta: f64) -> Self {
        if delta.is_nan() || delta.abs() < HOLD_BAND {
            SignalAction::Hold
        } else if delta > 0.0 {
            SignalAction::Buy
        } else {
            SignalAction::Sell
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalAction::Hold => "HOLD",
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
        }
    }
}

/// Today's position instruction for the signal instrument.
#[derive(Debug, Clone)]
pub struct RebalanceInstruction {
    pub date: NaiveDate,
    pub rai: f64,
    pub percentile: f64,
    pub target_weight: f64,
    pub current_weight: f64,
    /// target minus current, in weight fraction.
    pub delta: f64,
    pub dollar_amount: f64,
    pub action: SignalAction,
    /// False on non-execution days: the action is reported as pending and
    /// the position is unchanged.
    pub execution_day: bool,
}

/// One row of the recent-signal snapshot table.
#[derive(Debug, Clone)]
pub struct SignalRow {
    pub date: NaiveDate,
    pub price: f64,
    pub rai: f64,
    pub percentile: f64,
    pub target_weight: f64,
    pub delta: f64,
    pub action: SignalAction,
    /// True when the row falls on a non-execution day (instruction shown
    /// as scheduled, position carried unchanged).
    pub scheduled: bool,
}

/// Instruction for the most recent date of `rai`.
pub fn today_instruction(
    rai: &RaiSeries,
    percentiles: &[f64],
    profile: StrategyProfile,
    frequency: RebalanceFrequency,
    current_weight: f64,
    portfolio_value: f64,
) -> Result<RebalanceInstruction, RiskpulseError> {
    if rai.is_empty() {
        return Err(RiskpulseError::EmptyDataset {
            reason: "no dates to signal on".into(),
        });
    }
    let last = rai.len() - 1;
    let date = rai.dates[last];
    let q = percentiles[last];
    let target_weight = profile.target_weight(q);
    let delta = target_weight - current_weight;
    let execution_day = frequency.is_execution_day(date, &rai.dates);

    Ok(RebalanceInstruction {
        date,
        rai: rai.values[last],
        percentile: q,
        target_weight,
        current_weight,
        delta,
        dollar_amount: delta * portfolio_value,
        action: if execution_day {
            SignalAction::from_delta(delta)
        } else {
            SignalAction::Hold
        },
        execution_day,
    })
}

/// Signal rows for the most recent `days` trading days, simulating the
/// current weight forward: the weight only moves on execution days.
pub fn signal_snapshot(
    rai: &RaiSeries,
    percentiles: &[f64],
    prices: &[f64],
    profile: StrategyProfile,
    frequency: RebalanceFrequency,
    current_weight: f64,
    days: usize,
) -> Vec<SignalRow> {
    let start = rai.len().saturating_sub(days);
    let mut weight = current_weight;
    let mut rows = Vec::with_capacity(rai.len() - start);

    for i in start..rai.len() {
        let date = rai.dates[i];
        let q = percentiles[i];
        let target_weight = profile.target_weight(q);
        let delta = target_weight - weight;
        let execution = frequency.is_execution_day(date, &rai.dates);
        rows.push(SignalRow {
            date,
            price: prices[i],
            rai: rai.values[i],
            percentile: q,
            target_weight,
            delta,
            action: SignalAction::from_delta(delta),
            scheduled: !execution,
        });
        if execution && !target_weight.is_nan() {
            weight = target_weight;
        }
    }
    rows
}
