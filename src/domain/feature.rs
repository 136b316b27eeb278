//! The eight macro/technical features feeding the Risk Appetite Index.
//!
//! All inputs are aligned onto the anchor instrument's close-date index
//! before computation (auxiliary series forward-filled, anchor high/low
//! matched exactly). Every rolling window is full-window: a date without
//! enough prior observations gets NAN.

use crate::domain::rolling::{pct_change, rolling_mean, rolling_std_pop};
use chrono::NaiveDate;

pub const FEATURE_COUNT: usize = 8;

const REALIZED_VOL_WINDOW: usize = 20;
const TREND_WINDOW: usize = 200;
const ADX_PERIOD: usize = 14;
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Identity of one RAI input feature, with its fixed direction sign and
/// base composite weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    VixLevel,
    VixTerm,
    RealizedVol20,
    CreditRisk,
    CycDef,
    SmallBig,
    Trend200,
    Adx14,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::VixLevel,
        Feature::VixTerm,
        Feature::RealizedVol20,
        Feature::CreditRisk,
        Feature::CycDef,
        Feature::SmallBig,
        Feature::Trend200,
        Feature::Adx14,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::VixLevel => "vix_level",
            Feature::VixTerm => "vix_term",
            Feature::RealizedVol20 => "realized_vol20",
            Feature::CreditRisk => "credit_risk",
            Feature::CycDef => "cyc_def",
            Feature::SmallBig => "small_big",
            Feature::Trend200 => "trend_200",
            Feature::Adx14 => "adx14",
        }
    }

    /// +1 when higher raw values mean higher risk appetite, -1 otherwise.
    pub fn direction(&self) -> f64 {
        match self {
            Feature::VixLevel | Feature::VixTerm | Feature::RealizedVol20 => -1.0,
            Feature::CreditRisk
            | Feature::CycDef
            | Feature::SmallBig
            | Feature::Trend200
            | Feature::Adx14 => 1.0,
        }
    }

    /// Fixed composite weight (asymmetric signs baked in).
    pub fn base_weight(&self) -> f64 {
        match self {
            Feature::VixLevel => 0.0087,
            Feature::SmallBig => 0.0079,
            Feature::RealizedVol20 => 0.0033,
            Feature::CycDef => 0.0023,
            Feature::Adx14 => 0.0007,
            Feature::VixTerm => -0.0044,
            Feature::CreditRisk => -0.0147,
            Feature::Trend200 => -0.0162,
        }
    }

    fn index(&self) -> usize {
        Feature::ALL.iter().position(|f| f == self).expect("listed")
    }
}

/// Raw inputs on the anchor date index. Auxiliary closes must already be
/// reindexed and forward-filled; anchor high/low exact-matched.
#[derive(Debug, Clone)]
pub struct FeatureInputs {
    pub dates: Vec<NaiveDate>,
    pub anchor_close: Vec<f64>,
    pub anchor_high: Vec<f64>,
    pub anchor_low: Vec<f64>,
    pub small_cap: Vec<f64>,
    pub high_yield: Vec<f64>,
    pub invest_grade: Vec<f64>,
    pub cyclical: Vec<f64>,
    pub defensive: Vec<f64>,
    pub vix: Vec<f64>,
    pub vix3m: Vec<f64>,
}

/// One daily series per feature, all on the anchor date index.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub dates: Vec<NaiveDate>,
    columns: [Vec<f64>; FEATURE_COUNT],
}

impl FeatureFrame {
    pub fn compute(inputs: &FeatureInputs) -> FeatureFrame {
        let n = inputs.dates.len();
        let vix_term = ratio(&inputs.vix, &inputs.vix3m);

        let returns = pct_change(&inputs.anchor_close);
        let realized_vol20: Vec<f64> = rolling_std_pop(&returns, REALIZED_VOL_WINDOW)
            .into_iter()
            .map(|v| v * TRADING_DAYS_PER_YEAR.sqrt())
            .collect();

        let credit_risk = ratio(&inputs.high_yield, &inputs.invest_grade);
        let cyc_def = ratio(&inputs.cyclical, &inputs.defensive);
        let small_big = ratio(&inputs.small_cap, &inputs.anchor_close);

        let sma200 = rolling_mean(&inputs.anchor_close, TREND_WINDOW);
        let trend_200: Vec<f64> = (0..n)
            .map(|i| inputs.anchor_close[i] / sma200[i] - 1.0)
            .collect();

        let adx14 = adx(
            &inputs.anchor_high,
            &inputs.anchor_low,
            &inputs.anchor_close,
            ADX_PERIOD,
        );

        FeatureFrame {
            dates: inputs.dates.clone(),
            columns: [
                inputs.vix.clone(),
                vix_term,
                realized_vol20,
                credit_risk,
                cyc_def,
                small_big,
                trend_200,
                adx14,
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, feature: Feature) -> &[f64] {
        &self.columns[feature.index()]
    }

    /// Replace a column wholesale. Used by the z-score step, which keeps
    /// the frame shape.
    pub fn with_columns(dates: Vec<NaiveDate>, columns: [Vec<f64>; FEATURE_COUNT]) -> Self {
        FeatureFrame { dates, columns }
    }
}

fn ratio(numer: &[f64], denom: &[f64]) -> Vec<f64> {
    numer.iter().zip(denom).map(|(a, b)| a / b).collect()
}

/// Average Directional Index over `period`, Wilder-style directional
/// movement with plain rolling means.
fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len();
    let mut plus_dm = Vec::with_capacity(n);
    let mut minus_dm = Vec::with_capacity(n);
    let mut true_range = Vec::with_capacity(n);

    for i in 0..n {
        let (prev_high, prev_low, prev_close) = if i == 0 {
            (f64::NAN, f64::NAN, f64::NAN)
        } else {
            (high[i - 1], low[i - 1], close[i - 1])
        };

        // NAN comparisons are false, so the first bar contributes 0 movement
        let up_move = high[i] - prev_high;
        let down_move = -(low[i] - prev_low);
        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });

        true_range.push(nan_max(&[
            high[i] - low[i],
            (high[i] - prev_close).abs(),
            (low[i] - prev_close).abs(),
        ]));
    }

    let atr = rolling_mean(&true_range, period);
    let plus_dm_avg = rolling_mean(&plus_dm, period);
    let minus_dm_avg = rolling_mean(&minus_dm, period);

    let dx: Vec<f64> = (0..n)
        .map(|i| {
            let plus_di = 100.0 * plus_dm_avg[i] / atr[i];
            let minus_di = 100.0 * minus_dm_avg[i] / atr[i];
            let dx = 100.0 * (plus_di - minus_di).abs() / (plus_di + minus_di);
            // both DI zero gives 0/0; infinite values are coerced too
            if dx.is_finite() { dx } else { f64::NAN }
        })
        .collect();

    rolling_mean(&dx, period)
}

/// Maximum ignoring NAN entries; NAN only when every entry is NAN.
fn nan_max(candidates: &[f64]) -> f64 {
    let max = candidates
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY { f64::NAN } else { max }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    fn flat_inputs(n: usize) -> FeatureInputs {
        FeatureInputs {
            dates: dates(n),
            anchor_close: vec![100.0; n],
            anchor_high: vec![101.0; n],
            anchor_low: vec![99.0; n],
            small_cap: vec![50.0; n],
            high_yield: vec![80.0; n],
            invest_grade: vec![100.0; n],
            cyclical: vec![60.0; n],
            defensive: vec![40.0; n],
            vix: vec![18.0; n],
            vix3m: vec![20.0; n],
        }
    }

    #[test]
    fn ratio_features_match_inputs() {
        let frame = FeatureFrame::compute(&flat_inputs(5));
        assert_relative_eq!(frame.column(Feature::VixLevel)[0], 18.0);
        assert_relative_eq!(frame.column(Feature::VixTerm)[0], 0.9);
        assert_relative_eq!(frame.column(Feature::CreditRisk)[4], 0.8);
        assert_relative_eq!(frame.column(Feature::CycDef)[4], 1.5);
        assert_relative_eq!(frame.column(Feature::SmallBig)[4], 0.5);
    }

    #[test]
    fn realized_vol_warmup_then_zero_for_flat_prices() {
        let frame = FeatureFrame::compute(&flat_inputs(30));
        let vol = frame.column(Feature::RealizedVol20);
        // pct_change is NAN at index 0, so the 20-day window fills at index 20
        assert!(vol[19].is_nan());
        assert_relative_eq!(vol[20], 0.0);
    }

    #[test]
    fn trend_requires_full_200_day_window() {
        let frame = FeatureFrame::compute(&flat_inputs(210));
        let trend = frame.column(Feature::Trend200);
        assert!(trend[198].is_nan());
        assert_relative_eq!(trend[199], 0.0);
    }

    #[test]
    fn trend_positive_for_rising_prices() {
        let mut inputs = flat_inputs(210);
        inputs.anchor_close = (0..210).map(|i| 100.0 + i as f64).collect();
        let frame = FeatureFrame::compute(&inputs);
        assert!(frame.column(Feature::Trend200)[209] > 0.0);
    }

    #[test]
    fn adx_is_nan_before_both_windows_fill() {
        let frame = FeatureFrame::compute(&flat_inputs(40));
        let adx14 = frame.column(Feature::Adx14);
        // DX needs 14 bars, its rolling mean another 13
        for v in adx14.iter().take(26) {
            assert!(v.is_nan());
        }
    }

    #[test]
    fn adx_flat_market_has_no_directional_movement() {
        // flat highs/lows: both DM averages are 0, DX is 0/0 -> NAN, so the
        // ADX column stays NAN even after warmup
        let frame = FeatureFrame::compute(&flat_inputs(60));
        assert!(frame.column(Feature::Adx14).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn adx_trending_market_is_strong() {
        let n = 80;
        let mut inputs = flat_inputs(n);
        inputs.anchor_close = (0..n).map(|i| 100.0 + 2.0 * i as f64).collect();
        inputs.anchor_high = inputs.anchor_close.iter().map(|c| c + 1.0).collect();
        inputs.anchor_low = inputs.anchor_close.iter().map(|c| c - 1.0).collect();
        let frame = FeatureFrame::compute(&inputs);
        let last = *frame.column(Feature::Adx14).last().unwrap();
        // one-way uptrend: -DM is always 0 so DX is pinned at 100
        assert_relative_eq!(last, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn base_weights_match_published_table() {
        let total_abs: f64 = Feature::ALL.iter().map(|f| f.base_weight().abs()).sum();
        assert_relative_eq!(total_abs, 0.0582, epsilon = 1e-12);
        assert_relative_eq!(Feature::VixLevel.base_weight(), 0.0087);
        assert_relative_eq!(Feature::Trend200.base_weight(), -0.0162);
        assert_relative_eq!(Feature::VixLevel.direction(), -1.0);
        assert_relative_eq!(Feature::Trend200.direction(), 1.0);
    }

    #[test]
    fn forward_filled_gap_propagates_through_ratio() {
        let mut inputs = flat_inputs(5);
        inputs.vix3m = vec![f64::NAN, 20.0, 20.0, 20.0, 20.0];
        let frame = FeatureFrame::compute(&inputs);
        assert!(frame.column(Feature::VixTerm)[0].is_nan());
        assert_relative_eq!(frame.column(Feature::VixTerm)[1], 0.9);
    }
}
