//! Live trading session: a cooperative polling loop.
//!
//! Each iteration refreshes a rolling bar window through the market data
//! port, recomputes the signal at the latest bar and applies the same
//! Flat/Long state machine as the backtest engine, gated by account
//! balances. The loop owns its session state; nothing is shared between
//! sessions, so independent pairs/strategies can run side by side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::bar::PriceSeries;
use super::engine::DEFAULT_INITIAL_EQUITY;
use super::error::PairtraderError;
use super::position::{PositionBook, TradeRecord};
use super::signal::Signal;
use super::strategy::StrategyConfig;
use crate::ports::account_port::{AccountPort, Side};
use crate::ports::market_data_port::MarketDataPort;

/// Observed minimum order size in quote currency.
pub const MIN_INVESTMENT: f64 = 6.0;

/// Cooperative cancellation for a live session.
///
/// `stop` is idempotent; the loop checks the token once per iteration, at
/// the top, so at most one iteration completes after the flag is set.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        StopToken::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Retry policy for provider calls inside the loop. A fetch failure is
/// never treated as Hold: it is retried up to `max_attempts` times in total
/// and then aborts the session with the underlying error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveOptions {
    /// Percentage of the free quote balance to commit per entry.
    pub risk_pct: f64,
    /// Entries below this quote amount are skipped (logged, loop continues).
    pub min_investment: f64,
    /// Route orders through the account port. Off by default: the session
    /// then only simulates fills in its position book.
    pub place_orders: bool,
    pub retry: RetryPolicy,
    pub initial_equity: f64,
}

impl Default for LiveOptions {
    fn default() -> Self {
        LiveOptions {
            risk_pct: 100.0,
            min_investment: MIN_INVESTMENT,
            place_orders: false,
            retry: RetryPolicy::default(),
            initial_equity: DEFAULT_INITIAL_EQUITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveSummary {
    pub iterations: u64,
    pub final_equity: f64,
    pub trades: Vec<TradeRecord>,
    pub open_entry: Option<f64>,
}

fn with_retry<T>(
    policy: &RetryPolicy,
    mut call: impl FnMut() -> Result<T, PairtraderError>,
) -> Result<T, PairtraderError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                warn!(attempt, error = %err, "provider call failed, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run a live session until the token is stopped or a provider error
/// exhausts the retry policy.
///
/// The loop does not sleep between iterations; pacing is the market data
/// provider's concern (e.g. an exchange rate limiter).
pub fn run_live(
    market: &dyn MarketDataPort,
    account: &dyn AccountPort,
    pair: &str,
    timeframe: &str,
    strategy: &StrategyConfig,
    token: &StopToken,
    options: &LiveOptions,
) -> Result<LiveSummary, PairtraderError> {
    let mut series = PriceSeries::new(pair, timeframe);
    let mut book = PositionBook::new(options.initial_equity, strategy.fee);
    let mut iterations = 0u64;

    info!(pair, timeframe, "live trading is running");

    while !token.is_stopped() {
        iterations += 1;

        if series.is_empty() {
            let seed = with_retry(&options.retry, || {
                market.fetch_ohlcv(pair, timeframe, None, Some(strategy.initial_window()))
            })?;
            for bar in seed {
                series.append(bar);
            }
        }

        let latest = with_retry(&options.retry, || {
            market.fetch_ohlcv(pair, timeframe, None, Some(1))
        })?;
        for bar in latest {
            series.append(bar);
        }

        let signal = if series.is_empty() {
            warn!(pair, "no bars available yet");
            Signal::Hold
        } else {
            let signals = strategy.build(&series)?;
            signals.signal_at(series.len() - 1)
        };

        match signal {
            Signal::Buy if !book.is_open() => {
                let quantity =
                    with_retry(&options.retry, || account.free_quantity(pair, Side::Buy))?;
                let investment = quantity * options.risk_pct / 100.0;
                if investment >= options.min_investment {
                    if options.place_orders {
                        account.place_order(pair, Side::Buy, investment)?;
                    }
                    info!(pair, investment, "launch buy order");
                    let close = series.last().expect("non-empty series").close;
                    book.open(close);
                } else {
                    info!(pair, investment, "not enough funds for entry");
                }
            }
            Signal::Sell if book.is_open() => {
                let quantity =
                    with_retry(&options.retry, || account.free_quantity(pair, Side::Sell))?;
                if quantity > 0.0 {
                    if options.place_orders {
                        account.place_order(pair, Side::Sell, quantity)?;
                    }
                    info!(pair, quantity, "launch sell order");
                    let last = series.last().expect("non-empty series");
                    book.close(last.timestamp_ms, last.close);
                } else {
                    info!(pair, "not enough funds for exit");
                }
            }
            _ => {}
        }
    }

    info!(pair, iterations, "live trading is stopped");

    Ok(LiveSummary {
        iterations,
        final_equity: book.equity(),
        open_entry: book.entry_price(),
        trades: book.ledger().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use crate::domain::strategy::StrategyKind;
    use crate::ports::account_port::OrderConfirmation;
    use std::cell::{Cell, RefCell};

    fn make_bar(timestamp_ms: i64, close: f64) -> Bar {
        Bar {
            timestamp_ms,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    /// Feeds a scripted sequence of closes one bar per iteration and stops
    /// the token when the script is exhausted.
    struct ScriptedMarket {
        closes: Vec<f64>,
        cursor: Cell<usize>,
        token: StopToken,
        fail_after: Option<usize>,
    }

    impl ScriptedMarket {
        fn new(closes: Vec<f64>, token: StopToken) -> Self {
            ScriptedMarket {
                closes,
                cursor: Cell::new(0),
                token,
                fail_after: None,
            }
        }
    }

    impl MarketDataPort for ScriptedMarket {
        fn fetch_ohlcv(
            &self,
            _pair: &str,
            _timeframe: &str,
            _since_ms: Option<i64>,
            limit: Option<usize>,
        ) -> Result<Vec<Bar>, PairtraderError> {
            let cursor = self.cursor.get();
            if let Some(fail_after) = self.fail_after {
                if cursor >= fail_after {
                    return Err(PairtraderError::Provider {
                        reason: "connection reset".into(),
                    });
                }
            }
            let limit = limit.unwrap_or(1);
            let end = (cursor + limit).min(self.closes.len());
            let bars: Vec<Bar> = (cursor..end)
                .map(|i| make_bar((i as i64 + 1) * 60_000, self.closes[i]))
                .collect();
            self.cursor.set(end);
            if end >= self.closes.len() {
                self.token.stop();
            }
            Ok(bars)
        }
    }

    struct FakeAccount {
        quote_free: f64,
        base_free: f64,
        orders: RefCell<Vec<OrderConfirmation>>,
    }

    impl FakeAccount {
        fn new(quote_free: f64, base_free: f64) -> Self {
            FakeAccount {
                quote_free,
                base_free,
                orders: RefCell::new(Vec::new()),
            }
        }
    }

    impl AccountPort for FakeAccount {
        fn free_quantity(&self, _pair: &str, side: Side) -> Result<f64, PairtraderError> {
            Ok(match side {
                Side::Buy => self.quote_free,
                Side::Sell => self.base_free,
            })
        }

        fn place_order(
            &self,
            pair: &str,
            side: Side,
            amount: f64,
        ) -> Result<OrderConfirmation, PairtraderError> {
            let confirmation = OrderConfirmation {
                pair: pair.to_string(),
                side,
                amount,
            };
            self.orders.borrow_mut().push(confirmation.clone());
            Ok(confirmation)
        }
    }

    fn sma2_config() -> StrategyConfig {
        let mut config = StrategyConfig::new(StrategyKind::SimpleSma);
        config.sma_window = 2;
        config
    }

    #[test]
    fn stopped_token_runs_zero_iterations() {
        let token = StopToken::new();
        token.stop();
        let market = ScriptedMarket::new(vec![100.0; 10], token.clone());
        let account = FakeAccount::new(1000.0, 1.0);

        let summary = run_live(
            &market,
            &account,
            "BTC/USDT",
            "5m",
            &sma2_config(),
            &token,
            &LiveOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.iterations, 0);
        assert!(summary.trades.is_empty());
    }

    #[test]
    fn stop_is_idempotent() {
        let token = StopToken::new();
        token.stop();
        token.stop();
        assert!(token.is_stopped());
    }

    #[test]
    fn buy_then_sell_round_trip() {
        // Seed covers the first 3 closes, then one bar per iteration.
        // Closes: dip to 80, jump to 120 (Buy), then crash to 60 (Sell).
        let token = StopToken::new();
        let market = ScriptedMarket::new(
            vec![100.0, 90.0, 80.0, 120.0, 125.0, 60.0, 55.0],
            token.clone(),
        );
        let account = FakeAccount::new(1000.0, 1.0);

        let summary = run_live(
            &market,
            &account,
            "BTC/USDT",
            "5m",
            &sma2_config(),
            &token,
            &LiveOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.trades.len(), 1);
        let trade = &summary.trades[0];
        assert_eq!(trade.entry_price, 120.0);
        assert!(trade.price_delta < 0.0);
        assert_eq!(summary.open_entry, None);
    }

    #[test]
    fn entry_below_minimum_investment_is_skipped() {
        let token = StopToken::new();
        let market = ScriptedMarket::new(vec![100.0, 90.0, 80.0, 120.0, 125.0], token.clone());
        // 5 quote units at 100% risk stays under the 6.0 threshold.
        let account = FakeAccount::new(5.0, 1.0);

        let summary = run_live(
            &market,
            &account,
            "BTC/USDT",
            "5m",
            &sma2_config(),
            &token,
            &LiveOptions::default(),
        )
        .unwrap();

        assert!(summary.trades.is_empty());
        assert_eq!(summary.open_entry, None);
    }

    #[test]
    fn orders_not_routed_by_default() {
        let token = StopToken::new();
        let market = ScriptedMarket::new(vec![100.0, 90.0, 80.0, 120.0, 125.0], token.clone());
        let account = FakeAccount::new(1000.0, 1.0);

        run_live(
            &market,
            &account,
            "BTC/USDT",
            "5m",
            &sma2_config(),
            &token,
            &LiveOptions::default(),
        )
        .unwrap();

        assert!(account.orders.borrow().is_empty());
    }

    #[test]
    fn orders_routed_when_enabled() {
        let token = StopToken::new();
        let market = ScriptedMarket::new(vec![100.0, 90.0, 80.0, 120.0, 125.0], token.clone());
        let account = FakeAccount::new(1000.0, 1.0);
        let options = LiveOptions {
            place_orders: true,
            risk_pct: 10.0,
            ..LiveOptions::default()
        };

        run_live(
            &market,
            &account,
            "BTC/USDT",
            "5m",
            &sma2_config(),
            &token,
            &options,
        )
        .unwrap();

        let orders = account.orders.borrow();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
        assert_eq!(orders[0].amount, 100.0);
    }

    #[test]
    fn provider_error_aborts_after_retries() {
        let token = StopToken::new();
        let mut market = ScriptedMarket::new(vec![100.0, 90.0, 80.0], token.clone());
        market.fail_after = Some(0);
        let account = FakeAccount::new(1000.0, 1.0);

        let result = run_live(
            &market,
            &account,
            "BTC/USDT",
            "5m",
            &sma2_config(),
            &token,
            &LiveOptions::default(),
        );

        assert!(matches!(result, Err(PairtraderError::Provider { .. })));
    }

    #[test]
    fn retry_policy_retries_transient_failures() {
        struct FlakyMarket {
            failures_left: Cell<u32>,
            token: StopToken,
        }

        impl MarketDataPort for FlakyMarket {
            fn fetch_ohlcv(
                &self,
                _pair: &str,
                _timeframe: &str,
                _since_ms: Option<i64>,
                _limit: Option<usize>,
            ) -> Result<Vec<Bar>, PairtraderError> {
                if self.failures_left.get() > 0 {
                    self.failures_left.set(self.failures_left.get() - 1);
                    return Err(PairtraderError::Provider {
                        reason: "timeout".into(),
                    });
                }
                self.token.stop();
                Ok(vec![make_bar(60_000, 100.0)])
            }
        }

        let token = StopToken::new();
        let market = FlakyMarket {
            failures_left: Cell::new(2),
            token: token.clone(),
        };
        let account = FakeAccount::new(1000.0, 1.0);

        let summary = run_live(
            &market,
            &account,
            "BTC/USDT",
            "5m",
            &sma2_config(),
            &token,
            &LiveOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.iterations, 1);
    }
}
