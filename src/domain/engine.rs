//! Backtest engine: one forward pass over a historical series.
//!
//! State machine: Flat --Buy--> Long --Sell--> Flat. Hold, Buy-while-Long
//! and Sell-while-Flat leave both state and equity untouched. Bars are
//! visited in strictly increasing timestamp order starting at the signal
//! source's warm-up index; the only backward reference is the one-bar lag
//! inside the generators. No lookahead.

use tracing::info;

use super::bar::PriceSeries;
use super::error::PairtraderError;
use super::position::{FeePolicy, PositionBook, TradeRecord};
use super::signal::{Signal, SignalSource};
use super::strategy::StrategyConfig;

pub const DEFAULT_INITIAL_EQUITY: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    pub initial_equity: f64,
    /// Close any still-open position on the final bar. Off by default: the
    /// reported final equity then excludes unrealized gains or losses of an
    /// open trade, and the ledger only ever contains completed round trips.
    pub close_open_at_end: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            initial_equity: DEFAULT_INITIAL_EQUITY,
            close_open_at_end: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub return_pct: f64,
    pub trades: Vec<TradeRecord>,
    /// Entry price of a position still open when the series ran out.
    pub open_entry: Option<f64>,
}

/// Run a backtest of `config` over `series`.
///
/// All-or-nothing: any error aborts the run and no partial ledger is
/// returned. An empty series is fatal; a series shorter than the strategy's
/// warm-up produces a report with zero trades.
pub fn run_backtest(
    series: &PriceSeries,
    config: &StrategyConfig,
    options: &EngineOptions,
) -> Result<BacktestReport, PairtraderError> {
    if series.is_empty() {
        return Err(PairtraderError::NoData {
            pair: series.pair().to_string(),
            timeframe: series.timeframe().to_string(),
        });
    }

    let signals = config.build(series)?;
    let mut book = PositionBook::new(options.initial_equity, config.fee);

    info!(
        pair = series.pair(),
        bars = series.len(),
        initial_equity = book.initial_equity(),
        "starting backtest"
    );

    for (index, bar) in series.bars().iter().enumerate().skip(signals.warmup()) {
        match signals.signal_at(index) {
            Signal::Buy => {
                if !book.is_open() {
                    book.open(bar.close);
                }
            }
            Signal::Sell => {
                if book.is_open() {
                    book.close(bar.timestamp_ms, bar.close);
                }
            }
            Signal::Hold => {}
        }
    }

    if options.close_open_at_end && book.is_open() {
        let last = series.last().expect("non-empty series");
        book.close(last.timestamp_ms, last.close);
    }

    let report = BacktestReport {
        initial_equity: book.initial_equity(),
        final_equity: book.equity(),
        return_pct: 100.0 * (book.equity() / book.initial_equity() - 1.0),
        open_entry: book.entry_price(),
        trades: book.ledger().to_vec(),
    };

    info!(
        final_equity = report.final_equity,
        return_pct = report.return_pct,
        trades = report.trades.len(),
        "backtest complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use crate::domain::strategy::StrategyKind;
    use approx::assert_relative_eq;

    fn series_from_closes(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp_ms: (i as i64 + 1) * 60_000,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect();
        PriceSeries::from_bars("BTC/USDT", "1h", bars).unwrap()
    }

    fn sma_config(window: usize) -> StrategyConfig {
        let mut config = StrategyConfig::new(StrategyKind::SimpleSma);
        config.sma_window = window;
        config
    }

    #[test]
    fn empty_series_is_fatal() {
        let series = PriceSeries::new("BTC/USDT", "1h");
        let result = run_backtest(&series, &sma_config(2), &EngineOptions::default());
        assert!(matches!(result, Err(PairtraderError::NoData { .. })));
    }

    #[test]
    fn series_shorter_than_warmup_reports_no_trades() {
        let series = series_from_closes(&[100.0, 101.0]);
        let report = run_backtest(&series, &sma_config(5), &EngineOptions::default()).unwrap();
        assert!(report.trades.is_empty());
        assert_eq!(report.open_entry, None);
        assert_relative_eq!(report.final_equity, report.initial_equity);
    }

    #[test]
    fn flat_indicator_never_leaves_flat() {
        // Constant closes: SMA equals close for every bar, strict
        // comparisons never fire, no Buy ever happens.
        let series = series_from_closes(&[100.0; 50]);
        let report = run_backtest(&series, &sma_config(5), &EngineOptions::default()).unwrap();
        assert!(report.trades.is_empty());
        assert_eq!(report.open_entry, None);
        assert_relative_eq!(report.final_equity, 1000.0);
    }

    #[test]
    fn open_position_at_end_not_force_closed() {
        // Closes [100, 90, 80, 120, 130], SMA(2): Sell at t2 (no-op),
        // Buy at t3 opens at 120, Buy at t4 is a no-op. No Sell ever
        // fires, so the ledger stays empty and equity stays at its
        // initial value.
        let series = series_from_closes(&[100.0, 90.0, 80.0, 120.0, 130.0]);
        let report = run_backtest(&series, &sma_config(2), &EngineOptions::default()).unwrap();

        assert!(report.trades.is_empty());
        assert_eq!(report.open_entry, Some(120.0));
        assert_relative_eq!(report.final_equity, 1000.0);
        assert_relative_eq!(report.return_pct, 0.0);
    }

    #[test]
    fn close_open_at_end_realizes_last_trade() {
        let series = series_from_closes(&[100.0, 90.0, 80.0, 120.0, 130.0]);
        let options = EngineOptions {
            close_open_at_end: true,
            ..EngineOptions::default()
        };
        let report = run_backtest(&series, &sma_config(2), &options).unwrap();

        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.open_entry, None);
        // Entered at 120, force-closed at 130: +1/12 on 1000.
        assert_relative_eq!(
            report.final_equity,
            1000.0 + 1000.0 * 10.0 / 120.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn full_round_trip_applies_equity_formula() {
        // SMA(2) over [100, 100, 110, 121, 90, 80]:
        // t2: 110 > SMA[1]=100      -> Buy, open at 110
        // t3: 121 > SMA[2]=105      -> Buy while long, no-op
        // t4: 90 < SMA[3]=115.5     -> Sell, close at 90
        // t5: 80 < SMA[4]=105.5     -> Sell while flat, no-op
        let series = series_from_closes(&[100.0, 100.0, 110.0, 121.0, 90.0, 80.0]);
        let report = run_backtest(&series, &sma_config(2), &EngineOptions::default()).unwrap();

        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_relative_eq!(trade.entry_price, 110.0);
        assert_relative_eq!(trade.price_delta, -20.0);
        let expected = 1000.0 + 1000.0 * (90.0 - 110.0) / 110.0;
        assert_relative_eq!(report.final_equity, expected, epsilon = 1e-9);
        assert_relative_eq!(trade.equity_after, expected, epsilon = 1e-9);
        assert_eq!(report.open_entry, None);
    }

    #[test]
    fn equity_untouched_without_sell_while_long() {
        // Rising series: Buy fires early and never a Sell afterwards.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let series = series_from_closes(&closes);
        let report = run_backtest(&series, &sma_config(3), &EngineOptions::default()).unwrap();
        assert!(report.trades.is_empty());
        assert!(report.open_entry.is_some());
        assert_relative_eq!(report.final_equity, 1000.0);
    }

    #[test]
    fn custom_initial_equity() {
        let series = series_from_closes(&[100.0; 10]);
        let options = EngineOptions {
            initial_equity: 5000.0,
            ..EngineOptions::default()
        };
        let report = run_backtest(&series, &sma_config(2), &options).unwrap();
        assert_relative_eq!(report.initial_equity, 5000.0);
        assert_relative_eq!(report.final_equity, 5000.0);
    }

    #[test]
    fn return_pct_matches_equity_ratio() {
        let series = series_from_closes(&[100.0, 100.0, 110.0, 121.0, 90.0, 80.0]);
        let report = run_backtest(&series, &sma_config(2), &EngineOptions::default()).unwrap();
        assert_relative_eq!(
            report.return_pct,
            100.0 * (report.final_equity / 1000.0 - 1.0),
            epsilon = 1e-9
        );
    }
}
