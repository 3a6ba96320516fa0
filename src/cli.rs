//! CLI definition and dispatch.

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_cache_adapter::CsvCacheAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::http_exchange_adapter::{HttpExchangeAdapter, DEFAULT_BASE_URL};
use crate::adapters::paper_account_adapter::PaperAccountAdapter;
use crate::domain::bar::{Bar, PriceSeries};
use crate::domain::engine::{self, BacktestReport, EngineOptions};
use crate::domain::error::PairtraderError;
use crate::domain::live::{self, LiveOptions, RetryPolicy, StopToken};
use crate::domain::position::{FeePolicy, TradeRecord};
use crate::domain::strategy::{StrategyConfig, StrategyKind};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "pairtrader", about = "Signal-driven crypto backtester and paper trader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a strategy over historical candles
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Override [backtest] pair
        #[arg(long)]
        pair: Option<String>,
        /// Override [strategy] name
        #[arg(long)]
        strategy: Option<String>,
        /// Override [strategy] sma_window
        #[arg(long)]
        window: Option<usize>,
        /// Override [backtest] since (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS")
        #[arg(long)]
        since: Option<String>,
        /// Write the trade ledger as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a live paper-trading session until Enter is pressed
    Live {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
        /// Override [live] risk_pct
        #[arg(long)]
        risk: Option<f64>,
        /// Route orders through the account adapter
        #[arg(long)]
        place_orders: bool,
    },
    /// Fetch candles and write them as CSV
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        since: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            pair,
            strategy,
            window,
            since,
            output,
        } => run_backtest(
            &config,
            pair.as_deref(),
            strategy.as_deref(),
            window,
            since.as_deref(),
            output.as_ref(),
        ),
        Command::Live {
            config,
            pair,
            strategy,
            risk,
            place_orders,
        } => run_live(
            &config,
            pair.as_deref(),
            strategy.as_deref(),
            risk,
            place_orders,
        ),
        Command::Fetch {
            config,
            pair,
            since,
            output,
        } => run_fetch(&config, pair.as_deref(), since.as_deref(), &output),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PairtraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Parse a config/CLI timestamp into epoch milliseconds (UTC).
pub fn parse_since(value: &str) -> Result<i64, PairtraderError> {
    let datetime = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| PairtraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "since".into(),
            reason: "expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS".into(),
        })?;
    Ok(datetime.and_utc().timestamp_millis())
}

pub fn build_strategy_config(
    adapter: &dyn ConfigPort,
    name_override: Option<&str>,
) -> Result<StrategyConfig, PairtraderError> {
    let name = match name_override {
        Some(n) => n.to_string(),
        None => adapter.get_string("strategy", "name").ok_or_else(|| {
            PairtraderError::ConfigMissing {
                section: "strategy".into(),
                key: "name".into(),
            }
        })?,
    };
    let kind: StrategyKind = name.parse()?;

    let mut config = StrategyConfig::new(kind);
    config.sma_window = positive_int(adapter, "strategy", "sma_window", config.sma_window)?;
    config.rsi_period = positive_int(adapter, "strategy", "rsi_period", config.rsi_period)?;
    config.oversold = adapter.get_double("strategy", "oversold", config.oversold);
    config.overbought = adapter.get_double("strategy", "overbought", config.overbought);
    config.macd_short = positive_int(adapter, "strategy", "macd_short", config.macd_short)?;
    config.macd_long = positive_int(adapter, "strategy", "macd_long", config.macd_long)?;
    config.macd_signal = positive_int(adapter, "strategy", "macd_signal", config.macd_signal)?;
    config.fee = fee_policy(adapter)?;
    Ok(config)
}

fn positive_int(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, PairtraderError> {
    let value = adapter.get_int(section, key, default as i64);
    if value <= 0 {
        return Err(PairtraderError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("must be a positive integer, got {value}"),
        });
    }
    Ok(value as usize)
}

fn fee_policy(adapter: &dyn ConfigPort) -> Result<FeePolicy, PairtraderError> {
    let rate = adapter.get_double("strategy", "fee_rate", 0.0);
    let flat = adapter.get_double("strategy", "fee_flat", 0.0);
    match (rate > 0.0, flat > 0.0) {
        (true, true) => Err(PairtraderError::ConfigInvalid {
            section: "strategy".into(),
            key: "fee_rate".into(),
            reason: "fee_rate and fee_flat are mutually exclusive".into(),
        }),
        (true, false) => Ok(FeePolicy::ProportionalToEntry(rate)),
        (false, true) => Ok(FeePolicy::PerTradeFromEquity(flat)),
        (false, false) => Ok(FeePolicy::None),
    }
}

fn required_string(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    cli_override: Option<&str>,
) -> Result<String, PairtraderError> {
    match cli_override {
        Some(v) => Ok(v.to_string()),
        None => {
            adapter
                .get_string(section, key)
                .ok_or_else(|| PairtraderError::ConfigMissing {
                    section: section.into(),
                    key: key.into(),
                })
        }
    }
}

fn build_exchange(adapter: &dyn ConfigPort) -> Result<HttpExchangeAdapter, PairtraderError> {
    let base_url = adapter
        .get_string("exchange", "base_url")
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    HttpExchangeAdapter::new(&base_url)
}

fn fetch_bars(
    adapter: &dyn ConfigPort,
    exchange: &HttpExchangeAdapter,
    pair: &str,
    timeframe: &str,
    since_ms: Option<i64>,
) -> Result<Vec<Bar>, PairtraderError> {
    match adapter.get_string("cache", "dir") {
        Some(dir) => {
            let cache = CsvCacheAdapter::new(exchange, dir);
            cache.fetch_ohlcv(pair, timeframe, since_ms, None)
        }
        None => exchange.fetch_ohlcv(pair, timeframe, since_ms, None),
    }
}

fn run_backtest(
    config_path: &PathBuf,
    pair_override: Option<&str>,
    strategy_override: Option<&str>,
    window_override: Option<usize>,
    since_override: Option<&str>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Resolve pair, timeframe, range and strategy
    let inputs = (|| {
        let pair = required_string(&adapter, "backtest", "pair", pair_override)?;
        let timeframe = adapter
            .get_string("backtest", "timeframe")
            .unwrap_or_else(|| "1h".to_string());
        let since = match since_override {
            Some(v) => Some(parse_since(v)?),
            None => match adapter.get_string("backtest", "since") {
                Some(v) => Some(parse_since(&v)?),
                None => None,
            },
        };
        let mut strategy = build_strategy_config(&adapter, strategy_override)?;
        if let Some(window) = window_override {
            if window == 0 {
                return Err(PairtraderError::InvalidInput {
                    reason: "window must be a positive integer".into(),
                });
            }
            strategy.sma_window = window;
        }
        Ok::<_, PairtraderError>((pair, timeframe, since, strategy))
    })();
    let (pair, timeframe, since, strategy) = match inputs {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Fetch candles
    eprintln!("Fetching {pair} {timeframe} candles...");
    let result = (|| {
        let exchange = build_exchange(&adapter)?;
        let bars = fetch_bars(&adapter, &exchange, &pair, &timeframe, since)?;
        PriceSeries::from_bars(&pair, &timeframe, bars)
    })();
    let series = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Loaded {} bars", series.len());

    // Stage 4: Run the engine
    let options = EngineOptions {
        initial_equity: adapter.get_double(
            "backtest",
            "initial_equity",
            engine::DEFAULT_INITIAL_EQUITY,
        ),
        close_open_at_end: adapter.get_bool("backtest", "close_open_at_end", false),
    };
    let report = match engine::run_backtest(&series, &strategy, &options) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    print_report(&pair, &timeframe, series.len(), &report);

    // Stage 5: Ledger output
    if let Some(path) = output_path {
        if let Err(e) = write_ledger_csv(path, &report.trades) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Wrote {} trades to {}", report.trades.len(), path.display());
    }

    ExitCode::SUCCESS
}

fn print_report(pair: &str, timeframe: &str, bars: usize, report: &BacktestReport) {
    println!("Backtest: {pair} {timeframe}");
    println!("Bars:           {bars}");
    println!("Initial equity: {:.2}", report.initial_equity);
    println!("Final equity:   {:.2}", report.final_equity);
    println!("Return:         {:.2}%", report.return_pct);
    println!("Closed trades:  {}", report.trades.len());
    match report.open_entry {
        Some(entry) => println!("Open position:  entered at {entry:.2}"),
        None => println!("Open position:  none"),
    }
}

pub fn write_ledger_csv(path: &PathBuf, trades: &[TradeRecord]) -> Result<(), PairtraderError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["exit_timestamp_ms", "entry_price", "price_delta", "equity_after"])?;
    for trade in trades {
        writer.write_record([
            trade.exit_timestamp_ms.to_string(),
            trade.entry_price.to_string(),
            trade.price_delta.to_string(),
            trade.equity_after.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Spaces out latest-candle polls so the session does not hammer the
/// exchange. Seed fetches go through unpaced.
struct PacedMarket<'a> {
    inner: &'a dyn MarketDataPort,
    interval: Duration,
}

impl MarketDataPort for PacedMarket<'_> {
    fn fetch_ohlcv(
        &self,
        pair: &str,
        timeframe: &str,
        since_ms: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>, PairtraderError> {
        if limit == Some(1) {
            std::thread::sleep(self.interval);
        }
        self.inner.fetch_ohlcv(pair, timeframe, since_ms, limit)
    }
}

fn run_live(
    config_path: &PathBuf,
    pair_override: Option<&str>,
    strategy_override: Option<&str>,
    risk_override: Option<f64>,
    place_orders_flag: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let inputs = (|| {
        let pair = required_string(&adapter, "backtest", "pair", pair_override)?;
        let timeframe = adapter
            .get_string("backtest", "timeframe")
            .unwrap_or_else(|| "1h".to_string());
        let strategy = build_strategy_config(&adapter, strategy_override)?;
        Ok::<_, PairtraderError>((pair, timeframe, strategy))
    })();
    let (pair, timeframe, strategy) = match inputs {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let options = LiveOptions {
        risk_pct: risk_override.unwrap_or_else(|| adapter.get_double("live", "risk_pct", 100.0)),
        min_investment: adapter.get_double("live", "min_investment", live::MIN_INVESTMENT),
        place_orders: place_orders_flag || adapter.get_bool("live", "place_orders", false),
        retry: RetryPolicy {
            max_attempts: adapter.get_int("live", "max_retries", 3).max(1) as u32,
        },
        initial_equity: adapter.get_double(
            "live",
            "initial_equity",
            engine::DEFAULT_INITIAL_EQUITY,
        ),
    };

    let exchange = match build_exchange(&adapter) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let market = PacedMarket {
        inner: &exchange,
        interval: Duration::from_secs(adapter.get_int("live", "poll_interval_secs", 60).max(0) as u64),
    };
    let account = PaperAccountAdapter::from_config(&adapter);

    let token = StopToken::new();
    let stop = token.clone();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        stop.stop();
    });

    eprintln!("Live session on {pair} {timeframe}; press Enter to stop.");
    let summary = match live::run_live(
        &market,
        &account,
        &pair,
        &timeframe,
        &strategy,
        &token,
        &options,
    ) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("Live session: {pair} {timeframe}");
    println!("Iterations:     {}", summary.iterations);
    println!("Final equity:   {:.2}", summary.final_equity);
    println!("Closed trades:  {}", summary.trades.len());
    match summary.open_entry {
        Some(entry) => println!("Open position:  entered at {entry:.2}"),
        None => println!("Open position:  none"),
    }

    ExitCode::SUCCESS
}

fn run_fetch(
    config_path: &PathBuf,
    pair_override: Option<&str>,
    since_override: Option<&str>,
    output_path: &PathBuf,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = (|| {
        let pair = required_string(&adapter, "backtest", "pair", pair_override)?;
        let timeframe = adapter
            .get_string("backtest", "timeframe")
            .unwrap_or_else(|| "1h".to_string());
        let since = match since_override {
            Some(v) => Some(parse_since(v)?),
            None => match adapter.get_string("backtest", "since") {
                Some(v) => Some(parse_since(&v)?),
                None => None,
            },
        };
        let exchange = build_exchange(&adapter)?;
        eprintln!("Fetching {pair} {timeframe} candles...");
        let bars = fetch_bars(&adapter, &exchange, &pair, &timeframe, since)?;
        write_bars_csv(output_path, &bars)?;
        Ok::<usize, PairtraderError>(bars.len())
    })();

    match result {
        Ok(count) => {
            eprintln!("Wrote {count} bars to {}", output_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn write_bars_csv(path: &PathBuf, bars: &[Bar]) -> Result<(), PairtraderError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["timestamp_ms", "open", "high", "low", "close", "volume"])?;
    for bar in bars {
        writer.write_record([
            bar.timestamp_ms.to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
