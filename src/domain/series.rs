//! Daily price series and alignment.
//!
//! A [`PriceSeries`] holds one instrument's observed daily values with a
//! strictly increasing date index and no gaps filled in. Alignment onto a
//! common index is explicit per use: [`PriceSeries::reindex_ffill`] carries
//! the last observation forward (never backward), [`PriceSeries::reindex`]
//! matches exact dates only, and [`intersection_index`] keeps only dates
//! every symbol traded.

use crate::domain::error::RiskpulseError;
use chrono::NaiveDate;

/// Ordered (date, value) observations for one instrument.
///
/// Immutable once built. Values are prices (positive) or volatility-index
/// levels (nonnegative); dates are strictly increasing with no duplicates.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        points: Vec<(NaiveDate, f64)>,
    ) -> Result<Self, RiskpulseError> {
        let symbol = symbol.into();
        for pair in points.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(RiskpulseError::InvalidSeries {
                    symbol,
                    reason: format!(
                        "dates must be strictly increasing ({} then {})",
                        pair[0].0, pair[1].0
                    ),
                });
            }
        }
        if let Some((date, value)) = points.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(RiskpulseError::InvalidSeries {
                symbol,
                reason: format!("non-finite or negative value {value} on {date}"),
            });
        }
        let (dates, values) = points.into_iter().unzip();
        Ok(PriceSeries {
            symbol,
            dates,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Index of an exact date, if observed.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Value at each index date, exact matches only; NAN elsewhere.
    pub fn reindex(&self, index: &[NaiveDate]) -> Vec<f64> {
        index
            .iter()
            .map(|d| self.position(*d).map_or(f64::NAN, |i| self.values[i]))
            .collect()
    }

    /// Value at each index date, forward-filled from the most recent
    /// observation at or before it; NAN before the first observation.
    pub fn reindex_ffill(&self, index: &[NaiveDate]) -> Vec<f64> {
        index
            .iter()
            .map(|d| match self.dates.binary_search(d) {
                Ok(i) => self.values[i],
                Err(0) => f64::NAN,
                Err(i) => self.values[i - 1],
            })
            .collect()
    }
}

/// Daily history for one instrument as returned by the data port.
#[derive(Debug, Clone)]
pub struct InstrumentHistory {
    pub symbol: String,
    pub close: PriceSeries,
    pub high: PriceSeries,
    pub low: PriceSeries,
    pub adj_close: PriceSeries,
}

/// A fetched dataset. Symbols with no observations are absent, never
/// present with zero-valued data.
#[derive(Debug, Default)]
pub struct MarketData {
    histories: Vec<InstrumentHistory>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, history: InstrumentHistory) {
        self.histories.retain(|h| h.symbol != history.symbol);
        self.histories.push(history);
    }

    pub fn get(&self, symbol: &str) -> Option<&InstrumentHistory> {
        self.histories.iter().find(|h| h.symbol == symbol)
    }

    /// History for a required symbol, or [`RiskpulseError::DataGap`].
    pub fn require(&self, symbol: &str) -> Result<&InstrumentHistory, RiskpulseError> {
        self.get(symbol).ok_or_else(|| RiskpulseError::DataGap {
            symbol: symbol.to_string(),
        })
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.histories.iter().map(|h| h.symbol.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

/// Dates on which every given series has an observation, ascending.
pub fn intersection_index(series: &[&PriceSeries]) -> Vec<NaiveDate> {
    let Some(first) = series.first() else {
        return vec![];
    };
    first
        .dates
        .iter()
        .copied()
        .filter(|d| series[1..].iter().all(|s| s.position(*d).is_some()))
        .collect()
}
