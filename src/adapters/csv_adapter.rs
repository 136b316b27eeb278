//! CSV file market-data adapter.
//!
//! One file per symbol under a base directory, named `{SYMBOL}.csv` with
//! columns `date,open,high,low,close,adj_close`. A missing file means the
//! symbol is absent from the result, never an error and never zero data.

use crate::domain::error::RiskpulseError;
use crate::domain::series::{InstrumentHistory, MarketData, PriceSeries};
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    fn read_symbol(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Option<InstrumentHistory>, RiskpulseError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Ok(None);
        }

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| RiskpulseError::DataSource {
            reason: format!("failed to open {}: {}", path.display(), e),
        })?;

        let mut rows: Vec<(NaiveDate, f64, f64, f64, f64)> = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| RiskpulseError::DataSource {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str = field(&record, 0, "date", &path)?;
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                RiskpulseError::DataSource {
                    reason: format!("invalid date {date_str:?} in {}: {}", path.display(), e),
                }
            })?;
            if date < start_date || date > end_date {
                continue;
            }

            let high = parse_value(&record, 2, "high", &path)?;
            let low = parse_value(&record, 3, "low", &path)?;
            let close = parse_value(&record, 4, "close", &path)?;
            let adj_close = parse_value(&record, 5, "adj_close", &path)?;
            rows.push((date, high, low, close, adj_close));
        }

        if rows.is_empty() {
            return Ok(None);
        }
        rows.sort_by_key(|r| r.0);

        let series = |pick: fn(&(NaiveDate, f64, f64, f64, f64)) -> f64| {
            PriceSeries::new(symbol, rows.iter().map(|r| (r.0, pick(r))).collect())
        };
        Ok(Some(InstrumentHistory {
            symbol: symbol.to_string(),
            high: series(|r| r.1)?,
            low: series(|r| r.2)?,
            close: series(|r| r.3)?,
            adj_close: series(|r| r.4)?,
        }))
    }
}

fn field(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    path: &PathBuf,
) -> Result<String, RiskpulseError> {
    record
        .get(idx)
        .map(|s| s.to_string())
        .ok_or_else(|| RiskpulseError::DataSource {
            reason: format!("missing {name} column in {}", path.display()),
        })
}

fn parse_value(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    path: &PathBuf,
) -> Result<f64, RiskpulseError> {
    field(record, idx, name, path)?
        .parse()
        .map_err(|e| RiskpulseError::DataSource {
            reason: format!("invalid {name} value in {}: {}", path.display(), e),
        })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_history(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<MarketData, RiskpulseError> {
        let mut data = MarketData::new();
        for symbol in symbols {
            if let Some(history) = self.read_symbol(symbol, start_date, end_date)? {
                data.insert(history);
            }
        }
        Ok(data)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RiskpulseError> {
        let entries = std::fs::read_dir(&self.base_path).map_err(|e| {
            RiskpulseError::DataSource {
                reason: format!("failed to read {}: {}", self.base_path.display(), e),
            }
        })?;
        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RiskpulseError::DataSource {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".csv") {
                symbols.push(stem.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "date,open,high,low,close,adj_close\n";

    fn setup() -> (TempDir, CsvAdapter) {
        let dir = TempDir::new().unwrap();
        let content = format!(
            "{HEADER}2024-01-15,100,110,90,105,104\n\
             2024-01-16,105,115,100,110,109\n\
             2024-01-17,110,120,105,115,114\n"
        );
        fs::write(dir.path().join("SPY.csv"), content).unwrap();
        fs::write(dir.path().join("QQQ.csv"), HEADER).unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        (dir, adapter)
    }

    fn range() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    #[test]
    fn fetch_builds_all_four_series() {
        let (_dir, adapter) = setup();
        let (start, end) = range();
        let data = adapter.fetch_history(&["SPY".to_string()], start, end).unwrap();
        let spy = data.require("SPY").unwrap();
        assert_eq!(spy.close.len(), 3);
        assert_eq!(spy.close.values[0], 105.0);
        assert_eq!(spy.high.values[0], 110.0);
        assert_eq!(spy.low.values[0], 90.0);
        assert_eq!(spy.adj_close.values[0], 104.0);
    }

    #[test]
    fn date_range_filters_rows() {
        let (_dir, adapter) = setup();
        let day = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let data = adapter.fetch_history(&["SPY".to_string()], day, day).unwrap();
        assert_eq!(data.require("SPY").unwrap().close.len(), 1);
    }

    #[test]
    fn missing_file_means_absent_symbol() {
        let (_dir, adapter) = setup();
        let (start, end) = range();
        let data = adapter
            .fetch_history(&["SPY".to_string(), "GONE".to_string()], start, end)
            .unwrap();
        assert!(data.get("GONE").is_none());
        assert!(data.get("SPY").is_some());
    }

    #[test]
    fn header_only_file_means_absent_symbol() {
        let (_dir, adapter) = setup();
        let (start, end) = range();
        let data = adapter.fetch_history(&["QQQ".to_string()], start, end).unwrap();
        assert!(data.get("QQQ").is_none());
    }

    #[test]
    fn malformed_value_is_a_data_source_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            format!("{HEADER}2024-01-15,1,2,3,oops,5\n"),
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let (start, end) = range();
        let err = adapter.fetch_history(&["BAD".to_string()], start, end).unwrap_err();
        assert!(matches!(err, RiskpulseError::DataSource { .. }));
    }

    #[test]
    fn list_symbols_strips_extension_and_sorts() {
        let (_dir, adapter) = setup();
        assert_eq!(adapter.list_symbols().unwrap(), vec!["QQQ", "SPY"]);
    }
}
