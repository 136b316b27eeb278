//! Drawdown and peak-recovery analytics.
//!
//! All drawdowns are signed percentage points of the running maximum
//! (0 at a peak, -20.0 means twenty percent below the prior high).
//! Durations are calendar days, not trading days.

use crate::domain::error::RiskpulseError;
use crate::domain::series::PriceSeries;
use chrono::NaiveDate;

/// Minimum calendar-day duration for a peak-to-peak segment to be listed.
pub const SEGMENT_MIN_DAYS: i64 = 50;

/// Allocation stance implied by the current drawdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegimeTier {
    /// Current drawdown at or below -20%.
    AggressiveBuy,
    /// Current drawdown at or below -10% but above -20%.
    Accumulate,
    /// Current drawdown above -10%.
    Steady,
}

impl RegimeTier {
    pub fn from_drawdown(current_dd: f64) -> Self {
        if current_dd <= -20.0 {
            RegimeTier::AggressiveBuy
        } else if current_dd <= -10.0 {
            RegimeTier::Accumulate
        } else {
            RegimeTier::Steady
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RegimeTier::AggressiveBuy => "aggressive-buy",
            RegimeTier::Accumulate => "accumulate",
            RegimeTier::Steady => "steady",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RegimeTier::AggressiveBuy => "down 20%+ from peak, scale in aggressively",
            RegimeTier::Accumulate => "down 10-20% from peak, begin staged buying",
            RegimeTier::Steady => "within 10% of peak, keep regular contributions",
        }
    }
}

/// One decline-and-recovery window between consecutive peaks.
///
/// `recovery_date` is `None` for an in-progress decline running from the
/// most recent peak to the series' last available date.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoverySegment {
    pub peak_date: NaiveDate,
    pub recovery_date: Option<NaiveDate>,
    pub duration_days: i64,
    pub min_drawdown: f64,
}

/// Full drawdown analysis for one instrument, recomputed from scratch on
/// every run.
#[derive(Debug, Clone)]
pub struct DrawdownRecord {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub running_max: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    pub last_peak: NaiveDate,
    pub ongoing_days: i64,
    pub recoveries: Vec<RecoverySegment>,
    pub regime: RegimeTier,
}

impl DrawdownRecord {
    pub fn analyze(series: &PriceSeries) -> Result<Self, RiskpulseError> {
        if series.is_empty() {
            return Err(RiskpulseError::DataGap {
                symbol: series.symbol.clone(),
            });
        }

        let mut running_max = Vec::with_capacity(series.len());
        let mut drawdown = Vec::with_capacity(series.len());
        let mut peak_indices = Vec::new();
        let mut peak = f64::NEG_INFINITY;

        for (i, &price) in series.values.iter().enumerate() {
            if price > peak {
                peak = price;
            }
            running_max.push(peak);
            drawdown.push((price / peak - 1.0) * 100.0);
            // a revisit of the prior maximum counts as a new peak date
            if price == peak {
                peak_indices.push(i);
            }
        }

        let max_drawdown = drawdown.iter().copied().fold(0.0_f64, f64::min);
        let current_drawdown = *drawdown.last().expect("non-empty series");

        let last_date = *series.dates.last().expect("non-empty series");
        let last_peak_idx = peak_indices.last().copied().unwrap_or(0);
        let last_peak = series.dates[last_peak_idx];
        let ongoing_days = last_date.signed_duration_since(last_peak).num_days();

        let mut recoveries = Vec::new();
        for pair in peak_indices.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let days = series.dates[end]
                .signed_duration_since(series.dates[start])
                .num_days();
            if days >= SEGMENT_MIN_DAYS {
                recoveries.push(RecoverySegment {
                    peak_date: series.dates[start],
                    recovery_date: Some(series.dates[end]),
                    duration_days: days,
                    min_drawdown: range_min(&drawdown[start..=end]),
                });
            }
        }
        if ongoing_days >= SEGMENT_MIN_DAYS {
            recoveries.push(RecoverySegment {
                peak_date: last_peak,
                recovery_date: None,
                duration_days: ongoing_days,
                min_drawdown: range_min(&drawdown[last_peak_idx..]),
            });
        }
        recoveries.sort_by_key(|r| std::cmp::Reverse(r.duration_days));

        Ok(DrawdownRecord {
            symbol: series.symbol.clone(),
            dates: series.dates.clone(),
            running_max,
            drawdown,
            max_drawdown,
            current_drawdown,
            last_peak,
            ongoing_days,
            recoveries,
            regime: RegimeTier::from_drawdown(current_drawdown),
        })
    }

    /// The last price equalled the running maximum, so the instrument is
    /// setting a new all-time high. Reported distinctly from the numeric
    /// drawdown readout.
    pub fn at_all_time_high(&self) -> bool {
        self.current_drawdown == 0.0
    }
}

fn range_min(slice: &[f64]) -> f64 {
    slice.iter().copied().fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;
    use proptest::prelude::*;

    fn daily_series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        PriceSeries::new(
            "TEST",
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| (start + Duration::days(i as i64), p))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn worked_example_three_day_series() {
        // [100, 80, 120] -> running max [100,100,120], drawdown [0,-20,0]
        let record = DrawdownRecord::analyze(&daily_series(&[100.0, 80.0, 120.0])).unwrap();
        assert_eq!(record.running_max, vec![100.0, 100.0, 120.0]);
        assert_relative_eq!(record.drawdown[0], 0.0);
        assert_relative_eq!(record.drawdown[1], -20.0);
        assert_relative_eq!(record.drawdown[2], 0.0);
        assert_relative_eq!(record.max_drawdown, -20.0);
        assert_relative_eq!(record.current_drawdown, 0.0);
        assert_eq!(record.last_peak, record.dates[2]);
        assert!(record.at_all_time_high());
    }

    #[test]
    fn monotone_series_has_zero_max_drawdown() {
        let record = DrawdownRecord::analyze(&daily_series(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_relative_eq!(record.max_drawdown, 0.0);
        assert_eq!(record.ongoing_days, 0);
    }

    #[test]
    fn tie_with_prior_maximum_counts_as_peak() {
        let record = DrawdownRecord::analyze(&daily_series(&[100.0, 90.0, 100.0])).unwrap();
        assert_eq!(record.last_peak, record.dates[2]);
        assert!(record.at_all_time_high());
    }

    #[test]
    fn regime_boundaries_are_inclusive() {
        assert_eq!(RegimeTier::from_drawdown(-20.0), RegimeTier::AggressiveBuy);
        assert_eq!(RegimeTier::from_drawdown(-19.99), RegimeTier::Accumulate);
        assert_eq!(RegimeTier::from_drawdown(-10.0), RegimeTier::Accumulate);
        assert_eq!(RegimeTier::from_drawdown(-9.99), RegimeTier::Steady);
        assert_eq!(RegimeTier::from_drawdown(0.0), RegimeTier::Steady);
    }

    #[test]
    fn short_decline_is_not_listed() {
        // peak, 10-day dip, recovery: below the 50-day threshold
        let mut prices = vec![100.0];
        prices.extend(std::iter::repeat(90.0).take(10));
        prices.push(100.0);
        let record = DrawdownRecord::analyze(&daily_series(&prices)).unwrap();
        assert!(record.recoveries.is_empty());
    }

    #[test]
    fn long_closed_segment_is_listed_with_min_drawdown() {
        let mut prices = vec![100.0];
        prices.extend(std::iter::repeat(70.0).take(59));
        prices.push(100.0);
        let record = DrawdownRecord::analyze(&daily_series(&prices)).unwrap();
        assert_eq!(record.recoveries.len(), 1);
        let seg = &record.recoveries[0];
        assert_eq!(seg.peak_date, record.dates[0]);
        assert_eq!(seg.recovery_date, Some(record.dates[60]));
        assert_eq!(seg.duration_days, 60);
        assert_relative_eq!(seg.min_drawdown, -30.0);
    }

    #[test]
    fn open_segment_appended_when_decline_is_old_enough() {
        let mut prices = vec![100.0];
        prices.extend(std::iter::repeat(85.0).take(60));
        let record = DrawdownRecord::analyze(&daily_series(&prices)).unwrap();
        assert_eq!(record.recoveries.len(), 1);
        let seg = &record.recoveries[0];
        assert_eq!(seg.recovery_date, None);
        assert_eq!(seg.duration_days, 60);
        assert_relative_eq!(seg.min_drawdown, -15.0);
        assert_eq!(record.regime, RegimeTier::Accumulate);
    }

    #[test]
    fn segments_sorted_by_duration_descending() {
        // two closed dips: ~60 days then ~90 days
        let mut prices = vec![100.0];
        prices.extend(std::iter::repeat(80.0).take(59));
        prices.push(100.0);
        prices.extend(std::iter::repeat(75.0).take(89));
        prices.push(100.0);
        let record = DrawdownRecord::analyze(&daily_series(&prices)).unwrap();
        assert_eq!(record.recoveries.len(), 2);
        assert!(record.recoveries[0].duration_days >= record.recoveries[1].duration_days);
        assert_eq!(record.recoveries[0].duration_days, 90);
    }

    #[test]
    fn empty_series_is_a_data_gap() {
        let series = PriceSeries::new("EMPTY", vec![]).unwrap();
        let err = DrawdownRecord::analyze(&series).unwrap_err();
        assert!(matches!(err, RiskpulseError::DataGap { .. }));
    }

    proptest! {
        #[test]
        fn drawdown_never_positive_and_zero_at_peaks(
            prices in proptest::collection::vec(1.0_f64..10_000.0, 1..120)
        ) {
            let record = DrawdownRecord::analyze(&daily_series(&prices)).unwrap();
            for (i, &dd) in record.drawdown.iter().enumerate() {
                prop_assert!(dd <= 1e-12);
                if prices[i] == record.running_max[i] {
                    prop_assert!(dd.abs() < 1e-12);
                }
            }
        }

        #[test]
        fn max_and_current_agree_with_forward_scan(
            prices in proptest::collection::vec(1.0_f64..10_000.0, 1..120)
        ) {
            let record = DrawdownRecord::analyze(&daily_series(&prices)).unwrap();
            let mut peak = f64::NEG_INFINITY;
            let mut min_dd = 0.0_f64;
            let mut last_dd = 0.0_f64;
            for &p in &prices {
                peak = peak.max(p);
                last_dd = (p / peak - 1.0) * 100.0;
                min_dd = min_dd.min(last_dd);
            }
            prop_assert!((record.max_drawdown - min_dd).abs() < 1e-9);
            prop_assert!((record.current_drawdown - last_dd).abs() < 1e-9);
        }

        #[test]
        fn listed_segments_meet_threshold_and_share_boundaries_only(
            prices in proptest::collection::vec(1.0_f64..1_000.0, 2..200)
        ) {
            let record = DrawdownRecord::analyze(&daily_series(&prices)).unwrap();
            for seg in &record.recoveries {
                prop_assert!(seg.duration_days >= SEGMENT_MIN_DAYS);
            }
            let mut closed: Vec<_> = record
                .recoveries
                .iter()
                .filter_map(|s| s.recovery_date.map(|end| (s.peak_date, end)))
                .collect();
            closed.sort();
            for pair in closed.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].0);
            }
        }
    }
}
