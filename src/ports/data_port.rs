//! Market-data access port trait.

use crate::domain::error::RiskpulseError;
use crate::domain::series::MarketData;
use chrono::NaiveDate;

/// Supplier of daily instrument histories.
///
/// Implementations return fully-materialized, validated series. Symbols
/// with no observations in the range are simply absent from the result;
/// only the caller decides whether an absence is fatal.
pub trait MarketDataPort {
    fn fetch_history(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<MarketData, RiskpulseError>;

    fn list_symbols(&self) -> Result<Vec<String>, RiskpulseError>;
}
