//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::allocation::PortfolioAllocation;
use crate::domain::dca::{run_backtest, DcaConfig, PriceFrame, TrackKind};
use crate::domain::drawdown::DrawdownRecord;
use crate::domain::error::RiskpulseError;
use crate::domain::feature::{FeatureFrame, FeatureInputs};
use crate::domain::rai::{
    percentile_rank, signal_snapshot, today_instruction, zscore_frame, RaiSeries,
    RebalanceFrequency, StrategyProfile,
};
use crate::domain::series::{InstrumentHistory, MarketData, PriceSeries};
use crate::ports::data_port::MarketDataPort;
use crate::ports::config_port::ConfigPort;

/// Signal snapshot table length in trading days.
const SNAPSHOT_DAYS: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "riskpulse", about = "Drawdown, risk-appetite and DCA analytics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drawdown dashboard for the monitored symbols
    Monitor {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Risk Appetite Index rebalance instruction
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the configured strategy profile
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Dollar-cost-averaging backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file without fetching data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Monitor { config } => run_monitor(&config),
        Command::Signal { config, strategy } => run_signal(&config, strategy.as_deref()),
        Command::Backtest { config } => run_backtest_cmd(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = RiskpulseError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// The [data] section: CSV directory and fetch range. `end_date` is
/// optional and defaults to the open-ended maximum.
#[derive(Debug)]
pub struct DataSettings {
    pub csv_dir: PathBuf,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub fn build_data_settings(adapter: &dyn ConfigPort) -> Result<DataSettings, RiskpulseError> {
    let csv_dir = adapter
        .get_string("data", "csv_dir")
        .ok_or_else(|| RiskpulseError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        })?;
    Ok(DataSettings {
        csv_dir: PathBuf::from(csv_dir),
        start_date: require_date(adapter, "data", "start_date")?,
        end_date: optional_date(adapter, "data", "end_date")?.unwrap_or(NaiveDate::MAX),
    })
}

fn require_date(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, RiskpulseError> {
    optional_date(adapter, section, key)?.ok_or_else(|| RiskpulseError::ConfigMissing {
        section: section.into(),
        key: key.into(),
    })
}

fn optional_date(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, RiskpulseError> {
    match adapter.get_string(section, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map(Some).map_err(|_| {
            RiskpulseError::ConfigInvalid {
                section: section.into(),
                key: key.into(),
                reason: "invalid date format (expected YYYY-MM-DD)".into(),
            }
        }),
    }
}

/// Comma-separated symbol list from a config key, trimmed and uppercased.
pub fn resolve_symbols(adapter: &dyn ConfigPort, section: &str, key: &str) -> Vec<String> {
    adapter
        .get_string(section, key)
        .map(|s| {
            s.split(',')
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// The [signal] section: instrument universe plus strategy settings.
#[derive(Debug)]
pub struct SignalSettings {
    pub anchor: String,
    pub small_cap: String,
    pub high_yield: String,
    pub invest_grade: String,
    pub cyclical: String,
    pub defensive: String,
    pub vix: String,
    pub vix3m: String,
    pub profile: StrategyProfile,
    pub frequency: RebalanceFrequency,
    pub current_weight: f64,
    pub portfolio_value: f64,
}

impl SignalSettings {
    pub fn symbols(&self) -> Vec<String> {
        vec![
            self.anchor.clone(),
            self.small_cap.clone(),
            self.high_yield.clone(),
            self.invest_grade.clone(),
            self.cyclical.clone(),
            self.defensive.clone(),
            self.vix.clone(),
            self.vix3m.clone(),
        ]
    }
}

pub fn build_signal_settings(
    adapter: &dyn ConfigPort,
    strategy_override: Option<&str>,
) -> Result<SignalSettings, RiskpulseError> {
    let symbol = |key: &str, default: &str| {
        adapter
            .get_string("signal", key)
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_else(|| default.to_string())
    };

    let strategy_str = strategy_override
        .map(str::to_string)
        .or_else(|| adapter.get_string("signal", "strategy"))
        .unwrap_or_else(|| "neutral".to_string());
    let profile =
        StrategyProfile::parse(&strategy_str).ok_or_else(|| RiskpulseError::ConfigInvalid {
            section: "signal".into(),
            key: "strategy".into(),
            reason: format!("unknown profile {strategy_str:?}"),
        })?;

    let frequency_str = adapter
        .get_string("signal", "frequency")
        .unwrap_or_else(|| "weekly-friday".to_string());
    let frequency =
        RebalanceFrequency::parse(&frequency_str).ok_or_else(|| RiskpulseError::ConfigInvalid {
            section: "signal".into(),
            key: "frequency".into(),
            reason: format!("unknown frequency {frequency_str:?}"),
        })?;

    Ok(SignalSettings {
        anchor: symbol("anchor", "SPY"),
        small_cap: symbol("small_cap", "IWM"),
        high_yield: symbol("high_yield", "HYG"),
        invest_grade: symbol("invest_grade", "LQD"),
        cyclical: symbol("cyclical", "XLY"),
        defensive: symbol("defensive", "XLP"),
        vix: symbol("vix", "^VIX"),
        vix3m: symbol("vix3m", "^VIX3M"),
        profile,
        frequency,
        current_weight: adapter.get_double("signal", "current_weight", 0.0),
        portfolio_value: adapter.get_double("signal", "portfolio_value", 10_000.0),
    })
}

pub fn build_dca_config(adapter: &dyn ConfigPort) -> Result<DcaConfig, RiskpulseError> {
    Ok(DcaConfig {
        initial: adapter.get_double("backtest", "initial", 10_000.0),
        contribution: adapter.get_double("backtest", "contribution", 0.0),
        annual_cash_rate: adapter.get_double("backtest", "annual_cash_rate", 0.03),
        reinvest_dividends: adapter.get_bool("backtest", "reinvest_dividends", true),
        start_date: require_date(adapter, "backtest", "start_date")?,
    })
}

/// Portfolios named in [backtest] portfolios, each defined by a
/// [portfolio.<name>] section of symbol = percentage entries.
pub fn load_portfolios(
    adapter: &dyn ConfigPort,
) -> Result<Vec<PortfolioAllocation>, RiskpulseError> {
    let mut portfolios = Vec::new();
    for name in resolve_symbols(adapter, "backtest", "portfolios") {
        let name = name.to_lowercase();
        let entries: Vec<(String, f64)> = adapter
            .get_section(&format!("portfolio.{name}"))
            .into_iter()
            .map(|(symbol, pct)| {
                let pct: f64 = pct.trim().parse().map_err(|_| RiskpulseError::ConfigInvalid {
                    section: format!("portfolio.{name}"),
                    key: symbol.clone(),
                    reason: format!("invalid percentage {pct:?}"),
                })?;
                Ok((symbol, pct))
            })
            .collect::<Result<_, RiskpulseError>>()?;
        portfolios.push(PortfolioAllocation::from_percentages(name, &entries));
    }
    Ok(portfolios)
}

fn fetch(
    settings: &DataSettings,
    symbols: &[String],
) -> Result<MarketData, RiskpulseError> {
    let adapter = CsvAdapter::new(settings.csv_dir.clone());
    adapter.fetch_history(symbols, settings.start_date, settings.end_date)
}

fn run_monitor(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let settings = match build_data_settings(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let symbols = resolve_symbols(&adapter, "monitor", "symbols");
    if symbols.is_empty() {
        eprintln!("error: no symbols configured in [monitor]");
        return ExitCode::from(2);
    }
    let themes = adapter.get_section("themes");

    eprintln!("Fetching {} symbols from {}", symbols.len(), settings.csv_dir.display());
    let data = match fetch(&settings, &symbols) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("=== Market Monitor ===");
    let mut shown = 0;
    for symbol in &symbols {
        let history = match data.require(symbol) {
            Ok(h) => h,
            Err(e) => {
                eprintln!("warning: skipping {symbol} ({e})");
                continue;
            }
        };
        let record = match DrawdownRecord::analyze(&history.close) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("warning: skipping {symbol} ({e})");
                continue;
            }
        };
        print_monitor_entry(history, &record, &themes);
        shown += 1;
    }

    if shown == 0 {
        let err = RiskpulseError::EmptyDataset {
            reason: "no monitored symbol produced data".into(),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }
    ExitCode::SUCCESS
}

fn print_monitor_entry(
    history: &InstrumentHistory,
    record: &DrawdownRecord,
    themes: &[(String, String)],
) {
    let theme = themes
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(&history.symbol))
        .map(|(_, label)| format!("  ({label})"))
        .unwrap_or_default();
    println!("\n{}{}", history.symbol, theme);

    let price = history.close.last_value().unwrap_or(f64::NAN);
    let n = history.close.len();
    if n >= 2 {
        let change = (price / history.close.values[n - 2] - 1.0) * 100.0;
        println!("  price: {price:.2}  ({change:+.2}%)");
    } else {
        println!("  price: {price:.2}");
    }

    if record.at_all_time_high() {
        println!("  at new all-time high  [regime: {}]", record.regime.label());
    } else {
        println!(
            "  drawdown: {:.2}%  (peak {}, {} days ago)  [regime: {}]",
            record.current_drawdown,
            record.last_peak,
            record.ongoing_days,
            record.regime.label(),
        );
    }
    println!("  max drawdown: {:.2}%", record.max_drawdown);

    if !record.recoveries.is_empty() {
        println!("  declines of 50+ days:");
        for seg in &record.recoveries {
            let end = seg
                .recovery_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "ongoing".to_string());
            println!(
                "    {} -> {:10}  {:4} days  min {:.2}%",
                seg.peak_date, end, seg.duration_days, seg.min_drawdown,
            );
        }
    }
}

fn run_signal(config_path: &PathBuf, strategy_override: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let data_settings = match build_data_settings(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let signal = match build_signal_settings(&adapter, strategy_override) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Fetching {} symbols from {}",
        signal.symbols().len(),
        data_settings.csv_dir.display(),
    );
    let data = match fetch(&data_settings, &signal.symbols()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match signal_pipeline(&data, &signal) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Fetch-independent signal pipeline: features, z-scores, composite,
/// percentile, instruction, snapshot.
fn signal_pipeline(data: &MarketData, signal: &SignalSettings) -> Result<(), RiskpulseError> {
    let anchor = data.require(&signal.anchor)?;
    let index = anchor.close.dates.clone();

    let ffill = |symbol: &str| -> Result<Vec<f64>, RiskpulseError> {
        Ok(data.require(symbol)?.close.reindex_ffill(&index))
    };

    let inputs = FeatureInputs {
        anchor_close: anchor.close.values.clone(),
        anchor_high: anchor.high.reindex(&index),
        anchor_low: anchor.low.reindex(&index),
        small_cap: ffill(&signal.small_cap)?,
        high_yield: ffill(&signal.high_yield)?,
        invest_grade: ffill(&signal.invest_grade)?,
        cyclical: ffill(&signal.cyclical)?,
        defensive: ffill(&signal.defensive)?,
        vix: ffill(&signal.vix)?,
        vix3m: ffill(&signal.vix3m)?,
        dates: index,
    };

    eprintln!("Computing features over {} trading days", inputs.dates.len());
    let features = FeatureFrame::compute(&inputs);
    let zscores = zscore_frame(&features);
    let rai = RaiSeries::compose(&zscores, &features.dates);
    let percentiles = percentile_rank(&rai.values);

    let instruction = today_instruction(
        &rai,
        &percentiles,
        signal.profile,
        signal.frequency,
        signal.current_weight,
        signal.portfolio_value,
    )?;

    println!(
        "=== Risk Appetite Signal ({}, {}) ===",
        signal.profile.label(),
        signal.frequency.label(),
    );
    println!("date: {}", instruction.date);
    let last = rai.len() - 1;
    println!(
        "RAI: {:+.4}  percentile: {:.1}%  features: {}/8",
        instruction.rai,
        instruction.percentile * 100.0,
        rai.features_used[last],
    );
    println!(
        "target weight: {:.0}%  current: {:.0}%  delta: {:+.0}%",
        instruction.target_weight * 100.0,
        instruction.current_weight * 100.0,
        instruction.delta * 100.0,
    );
    if instruction.execution_day {
        println!(
            "action: {} ${:.2}",
            instruction.action.label(),
            instruction.dollar_amount.abs(),
        );
    } else {
        println!(
            "action: {} (next execution day: pending {:+.0}%)",
            instruction.action.label(),
            instruction.delta * 100.0,
        );
    }

    let rows = signal_snapshot(
        &rai,
        &percentiles,
        &inputs.anchor_close,
        signal.profile,
        signal.frequency,
        signal.current_weight,
        SNAPSHOT_DAYS,
    );
    println!("\ndate        price       RAI      pct  target   delta  action");
    for row in &rows {
        let sched = if row.scheduled { " [Sched]" } else { "" };
        println!(
            "{}  {:8.2}  {:+.4}  {:5.1}%  {:5.0}%  {:+5.0}%  {}{}",
            row.date,
            row.price,
            row.rai,
            row.percentile * 100.0,
            row.target_weight * 100.0,
            row.delta * 100.0,
            row.action.label(),
            sched,
        );
    }
    Ok(())
}

fn run_backtest_cmd(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let data_settings = match build_data_settings(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let dca_config = match build_dca_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let portfolios = match load_portfolios(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let benchmarks = resolve_symbols(&adapter, "backtest", "benchmarks");

    let mut symbols: Vec<String> = Vec::new();
    for portfolio in &portfolios {
        for symbol in portfolio.symbols() {
            if !symbols.iter().any(|s| s == symbol) {
                symbols.push(symbol.to_string());
            }
        }
    }
    for symbol in &benchmarks {
        if !symbols.contains(symbol) {
            symbols.push(symbol.clone());
        }
    }
    if symbols.is_empty() {
        eprintln!("error: no portfolios or benchmarks configured in [backtest]");
        return ExitCode::from(2);
    }

    eprintln!(
        "Fetching {} symbols from {}",
        symbols.len(),
        data_settings.csv_dir.display(),
    );
    let data = match fetch(&data_settings, &symbols) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Adjusted closes fold dividends back in; raw closes model a
    // no-reinvestment account.
    let series: Result<Vec<PriceSeries>, RiskpulseError> = symbols
        .iter()
        .map(|symbol| {
            let history = data.require(symbol)?;
            Ok(if dca_config.reinvest_dividends {
                history.adj_close.clone()
            } else {
                history.close.clone()
            })
        })
        .collect();
    let series = match series {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let frame = match PriceFrame::intersect(&series, dca_config.start_date) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Running DCA simulation: {} to {}, {} trading days",
        frame.dates.first().expect("non-empty frame"),
        frame.dates.last().expect("non-empty frame"),
        frame.len(),
    );

    let result = match run_backtest(&frame, &portfolios, &benchmarks, &dca_config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("=== DCA Backtest ===");
    println!(
        "{:<12}  {:>12}  {:>12}  {:>8}  {:>7}  {:>6}  {:>7}  {:>6}  {:>7}",
        "track", "end balance", "invested", "ROI", "CAGR", "vol", "max DD", "sharpe", "sortino",
    );
    for track in &result.tracks {
        let m = &track.metrics;
        let label = match track.kind {
            TrackKind::Cash => format!("{} (cash)", track.name),
            TrackKind::Portfolio => track.name.clone(),
            TrackKind::Benchmark => format!("{} (bench)", track.name),
        };
        println!(
            "{:<12}  {:>12.2}  {:>12.2}  {:>7.1}%  {:>6.1}%  {:>5.1}%  {:>6.1}%  {:>6.2}  {:>7.2}",
            label,
            m.end_balance,
            m.total_invested,
            m.roi * 100.0,
            m.cagr * 100.0,
            m.volatility * 100.0,
            m.max_drawdown,
            m.sharpe,
            m.sortino,
        );
    }

    println!("\nyearly returns:");
    for track in &result.tracks {
        let yearly: Vec<String> = track
            .metrics
            .yearly_returns
            .iter()
            .map(|(year, r)| format!("{year} {:+.1}%", r * 100.0))
            .collect();
        println!("  {:<12}  {}", track.name, yearly.join("  "));
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let data_settings = match build_data_settings(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "  data: csv_dir {}, {} to {}",
        data_settings.csv_dir.display(),
        data_settings.start_date,
        data_settings.end_date,
    );

    let monitored = resolve_symbols(&adapter, "monitor", "symbols");
    if !monitored.is_empty() {
        eprintln!("  monitor: {} symbols ({})", monitored.len(), monitored.join(", "));
    }

    match build_signal_settings(&adapter, None) {
        Ok(signal) => eprintln!(
            "  signal: anchor {}, {} profile, {} execution",
            signal.anchor,
            signal.profile.label(),
            signal.frequency.label(),
        ),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    if adapter.get_string("backtest", "start_date").is_some() {
        let dca = match build_dca_config(&adapter) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        let portfolios = match load_portfolios(&adapter) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        let benchmarks = resolve_symbols(&adapter, "backtest", "benchmarks");
        eprintln!(
            "  backtest: from {}, initial {:.2}, contribution {:.2}/day, {} portfolios, {} benchmarks",
            dca.start_date,
            dca.initial,
            dca.contribution,
            portfolios.iter().filter(|p| !p.is_empty()).count(),
            benchmarks.len(),
        );
        for portfolio in &portfolios {
            if portfolio.is_empty() {
                eprintln!("warning: portfolio {} has no positive weights", portfolio.name);
            }
        }
    }

    eprintln!("\nConfig validated successfully");
    ExitCode::SUCCESS
}
