//! Moving-average signal generator
//!
//! Keeps the last `HISTORY_CAP` prices per subscribed symbol and compares
//! each new price against the simple moving average of the last
//! `MA_PERIOD` prices (the new one included).

use super::{Subscriber, SubscriberError};
use crate::protocol::Tick;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

pub const HISTORY_CAP: usize = 50;
pub const MA_PERIOD: usize = 20;
/// Percent away from the average that triggers a signal
pub const SIGNAL_THRESHOLD_PCT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradingSignal {
    Buy { price: f64, moving_average: f64, deviation_pct: f64 },
    Sell { price: f64, moving_average: f64, deviation_pct: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalCounts {
    pub buys: u64,
    pub sells: u64,
}

pub struct TradingAlgorithm {
    symbols: Mutex<HashSet<String>>,
    history: Mutex<HashMap<String, VecDeque<f64>>>,
    buys: AtomicU64,
    sells: AtomicU64,
}

impl TradingAlgorithm {
    pub fn new() -> Self {
        TradingAlgorithm {
            symbols: Mutex::new(HashSet::new()),
            history: Mutex::new(HashMap::new()),
            buys: AtomicU64::new(0),
            sells: AtomicU64::new(0),
        }
    }

    pub fn add_symbol(&self, symbol: &str) {
        if self.symbols.lock().insert(symbol.to_string()) {
            info!(symbol, "trading algorithm subscribed");
        }
    }

    pub fn remove_symbol(&self, symbol: &str) {
        if self.symbols.lock().remove(symbol) {
            info!(symbol, "trading algorithm unsubscribed");
        }
    }

    pub fn is_subscribed(&self, symbol: &str) -> bool {
        self.symbols.lock().contains(symbol)
    }

    /// Update history for `tick` and decide on a signal
    ///
    /// Ticks for symbols not subscribed leave no trace.
    pub fn evaluate(&self, tick: &Tick) -> Option<TradingSignal> {
        if !self.is_subscribed(&tick.symbol) {
            return None;
        }

        let moving_average = {
            let mut history = self.history.lock();
            let prices = history.entry(tick.symbol.clone()).or_default();
            prices.push_back(tick.price);
            while prices.len() > HISTORY_CAP {
                prices.pop_front();
            }
            sma(prices, MA_PERIOD)?
        };

        if moving_average <= 0.0 {
            return None;
        }

        let deviation_pct = (tick.price - moving_average) / moving_average * 100.0;
        if deviation_pct > SIGNAL_THRESHOLD_PCT {
            self.buys.fetch_add(1, Ordering::Relaxed);
            Some(TradingSignal::Buy { price: tick.price, moving_average, deviation_pct })
        } else if deviation_pct < -SIGNAL_THRESHOLD_PCT {
            self.sells.fetch_add(1, Ordering::Relaxed);
            Some(TradingSignal::Sell { price: tick.price, moving_average, deviation_pct })
        } else {
            None
        }
    }

    /// Current moving average for `symbol`, if enough history exists
    pub fn moving_average(&self, symbol: &str) -> Option<f64> {
        self.history.lock().get(symbol).and_then(|prices| sma(prices, MA_PERIOD))
    }

    pub fn history_len(&self, symbol: &str) -> usize {
        self.history.lock().get(symbol).map_or(0, VecDeque::len)
    }

    pub fn signal_counts(&self) -> SignalCounts {
        SignalCounts {
            buys: self.buys.load(Ordering::Relaxed),
            sells: self.sells.load(Ordering::Relaxed),
        }
    }
}

fn sma(prices: &VecDeque<f64>, period: usize) -> Option<f64> {
    if prices.len() < period {
        return None;
    }
    let sum: f64 = prices.iter().skip(prices.len() - period).sum();
    Some(sum / period as f64)
}

impl Default for TradingAlgorithm {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for TradingAlgorithm {
    fn on_market_data(&self, tick: &Tick) -> Result<(), SubscriberError> {
        match self.evaluate(tick) {
            Some(TradingSignal::Buy { price, moving_average, deviation_pct }) => {
                warn!(symbol = %tick.symbol, price, moving_average, deviation_pct, "BUY signal");
            }
            Some(TradingSignal::Sell { price, moving_average, deviation_pct }) => {
                warn!(symbol = %tick.symbol, price, moving_average, deviation_pct, "SELL signal");
            }
            None => {}
        }
        Ok(())
    }
}
