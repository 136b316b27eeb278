//! Performance metrics for contribution-adjusted equity curves.
//!
//! Returns account for the daily contribution: return(t) compares today's
//! value against yesterday's value plus the cash added today, so steady
//! contributions do not masquerade as market gains. ROI/CAGR/volatility
//! and yearly returns are fractions; max drawdown is signed percentage
//! points like the drawdown analyzer's output.

use chrono::{Datelike, NaiveDate};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    pub start_balance: f64,
    pub total_invested: f64,
    pub end_balance: f64,
    pub roi: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub yearly_returns: Vec<(i32, f64)>,
    pub best_year: f64,
    pub worst_year: f64,
}

impl PerformanceMetrics {
    /// Compute the bundle for one equity curve under fixed daily
    /// contributions and an annual cash rate (fraction, e.g. 0.03).
    pub fn compute(
        dates: &[NaiveDate],
        equity: &[f64],
        initial: f64,
        contribution: f64,
        annual_cash_rate: f64,
    ) -> Self {
        let n = equity.len();
        let returns = daily_returns(equity, contribution);

        let total_invested = initial + contribution * n as f64;
        let end_balance = equity.last().copied().unwrap_or(0.0);

        let roi = if total_invested > 0.0 {
            end_balance / total_invested - 1.0
        } else {
            0.0
        };

        let cagr = if n > 0 && end_balance > 0.0 && total_invested > 0.0 {
            (end_balance / total_invested).powf(TRADING_DAYS_PER_YEAR / n as f64) - 1.0
        } else {
            0.0
        };

        let volatility = sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt();
        let max_drawdown = equity_max_drawdown(equity);

        let rf_daily = (1.0 + annual_cash_rate).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0;
        let excess: Vec<f64> = returns.iter().map(|r| r - rf_daily).collect();
        let mean_excess = mean(&excess);

        let ret_std = sample_std(&returns);
        let sharpe = if ret_std > 0.0 {
            (mean_excess * TRADING_DAYS_PER_YEAR) / (ret_std * TRADING_DAYS_PER_YEAR.sqrt())
        } else {
            0.0
        };

        let downside: Vec<f64> = excess.iter().copied().filter(|e| *e < 0.0).collect();
        let downside_std = sample_std(&downside);
        let sortino = if downside_std > 0.0 {
            (mean_excess * TRADING_DAYS_PER_YEAR) / (downside_std * TRADING_DAYS_PER_YEAR.sqrt())
        } else {
            0.0
        };

        let yearly_returns = yearly_compound(dates, &returns);
        let best_year = yearly_returns
            .iter()
            .map(|(_, r)| *r)
            .fold(f64::NEG_INFINITY, f64::max);
        let worst_year = yearly_returns
            .iter()
            .map(|(_, r)| *r)
            .fold(f64::INFINITY, f64::min);

        PerformanceMetrics {
            start_balance: initial,
            total_invested,
            end_balance,
            roi,
            cagr,
            volatility,
            max_drawdown,
            sharpe,
            sortino,
            best_year: if yearly_returns.is_empty() { 0.0 } else { best_year },
            worst_year: if yearly_returns.is_empty() { 0.0 } else { worst_year },
            yearly_returns,
        }
    }
}

/// Contribution-adjusted daily returns. The first return is forced to 0;
/// a zero denominator yields 0 rather than a division error.
pub fn daily_returns(equity: &[f64], contribution: f64) -> Vec<f64> {
    let mut returns = Vec::with_capacity(equity.len());
    for (i, &value) in equity.iter().enumerate() {
        if i == 0 {
            returns.push(0.0);
            continue;
        }
        let denominator = equity[i - 1] + contribution;
        returns.push(if denominator != 0.0 {
            value / denominator - 1.0
        } else {
            0.0
        });
    }
    returns
}

/// Max drawdown of an equity curve in signed percentage points, matching
/// the drawdown analyzer's definition. Zero-valued peaks are guarded.
pub fn equity_max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut min_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            min_dd = min_dd.min((value / peak - 1.0) * 100.0);
        }
    }
    min_dd
}

/// Compounded return per calendar year: product of (1 + r) within the
/// year, minus 1.
pub fn yearly_compound(dates: &[NaiveDate], returns: &[f64]) -> Vec<(i32, f64)> {
    let mut out: Vec<(i32, f64)> = Vec::new();
    for (date, &r) in dates.iter().zip(returns) {
        match out.last_mut() {
            Some((year, acc)) if *year == date.year() => *acc *= 1.0 + r,
            _ => out.push((date.year(), 1.0 + r)),
        }
    }
    for (_, acc) in &mut out {
        *acc -= 1.0;
    }
    out
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (divisor n-1); 0 for fewer than two points.
fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() - 1) as f64;
    variance.sqrt()
}
