//! Running per-symbol price/volume aggregation

use super::{Subscriber, SubscriberError};
use crate::protocol::Tick;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// A snapshot is logged every this many ticks per symbol
pub const SNAPSHOT_EVERY: usize = 100;

#[derive(Debug, Default)]
struct Series {
    prices: Vec<f64>,
    volumes: Vec<i64>,
}

impl Series {
    fn average_price(&self) -> Option<f64> {
        if self.prices.is_empty() {
            return None;
        }
        Some(self.prices.iter().sum::<f64>() / self.prices.len() as f64)
    }

    fn total_volume(&self) -> i64 {
        self.volumes.iter().fold(0i64, |acc, &v| acc.saturating_add(v))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolReport {
    pub symbol: String,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub total_messages: u64,
    pub symbols: Vec<SymbolReport>,
}

impl AnalyticsReport {
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolReport> {
        self.symbols.iter().find(|r| r.symbol == symbol)
    }
}

pub struct Analytics {
    series: Mutex<BTreeMap<String, Series>>,
    total_messages: AtomicU64,
}

impl Analytics {
    pub fn new() -> Self {
        Analytics {
            series: Mutex::new(BTreeMap::new()),
            total_messages: AtomicU64::new(0),
        }
    }

    /// Add `tick` to its symbol's series
    ///
    /// Returns true when this tick completed a snapshot interval for the
    /// symbol and a snapshot was logged.
    pub fn record(&self, tick: &Tick) -> bool {
        let mut series = self.series.lock();
        let entry = series.entry(tick.symbol.clone()).or_default();
        entry.prices.push(tick.price);
        entry.volumes.push(tick.size);
        self.total_messages.fetch_add(1, Ordering::Relaxed);

        let count = entry.prices.len();
        let snapshot = count % SNAPSHOT_EVERY == 0;
        if snapshot {
            debug!(
                symbol = %tick.symbol,
                avg_price = entry.average_price().unwrap_or(0.0),
                total_volume = entry.total_volume(),
                messages = count,
                "analytics snapshot"
            );
        }
        snapshot
    }

    /// Build a report over a consistent view of every symbol seen
    pub fn report(&self) -> AnalyticsReport {
        let series = self.series.lock();
        let symbols = series
            .iter()
            .filter(|(_, s)| !s.prices.is_empty())
            .map(|(symbol, s)| {
                let (min, max) = s
                    .prices
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));
                SymbolReport {
                    symbol: symbol.clone(),
                    average: s.average_price().unwrap_or(0.0),
                    min,
                    max,
                    count: s.prices.len(),
                }
            })
            .collect();

        AnalyticsReport {
            total_messages: self.total_messages.load(Ordering::Relaxed),
            symbols,
        }
    }

    /// Log and return the full report
    pub fn generate_report(&self) -> AnalyticsReport {
        let report = self.report();
        info!(total_messages = report.total_messages, "analytics report");
        for r in &report.symbols {
            info!(
                symbol = %r.symbol,
                avg = r.average,
                min = r.min,
                max = r.max,
                count = r.count,
                "analytics report entry"
            );
        }
        report
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }

    pub fn average_price(&self, symbol: &str) -> Option<f64> {
        self.series.lock().get(symbol).and_then(Series::average_price)
    }

    pub fn total_volume(&self, symbol: &str) -> i64 {
        self.series.lock().get(symbol).map_or(0, Series::total_volume)
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for Analytics {
    fn on_market_data(&self, tick: &Tick) -> Result<(), SubscriberError> {
        self.record(tick);
        Ok(())
    }
}
