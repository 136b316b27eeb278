//! Domain error types.

/// Top-level error type for riskpulse.
///
/// Per-date "insufficient history" conditions are not errors: rolling
/// computations emit an `f64::NAN` sentinel for dates whose window is
/// incomplete. Only run-level failures surface through this enum.
#[derive(Debug, thiserror::Error)]
pub enum RiskpulseError {
    #[error("no observations for {symbol}")]
    DataGap { symbol: String },

    #[error("no overlapping trading days across {symbols} symbols")]
    NoOverlap { symbols: usize },

    #[error("empty dataset: {reason}")]
    EmptyDataset { reason: String },

    #[error("invalid series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&RiskpulseError> for std::process::ExitCode {
    fn from(err: &RiskpulseError) -> Self {
        let code: u8 = match err {
            RiskpulseError::Io(_) => 1,
            RiskpulseError::ConfigParse { .. }
            | RiskpulseError::ConfigMissing { .. }
            | RiskpulseError::ConfigInvalid { .. } => 2,
            RiskpulseError::DataSource { .. } => 3,
            RiskpulseError::InvalidSeries { .. } => 4,
            RiskpulseError::DataGap { .. }
            | RiskpulseError::NoOverlap { .. }
            | RiskpulseError::EmptyDataset { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_gap_message_names_symbol() {
        let err = RiskpulseError::DataGap {
            symbol: "QQQ".into(),
        };
        assert_eq!(err.to_string(), "no observations for QQQ");
    }

    #[test]
    fn config_missing_message_names_section_and_key() {
        let err = RiskpulseError::ConfigMissing {
            section: "backtest".into(),
            key: "start_date".into(),
        };
        assert_eq!(err.to_string(), "missing config key [backtest] start_date");
    }
}
