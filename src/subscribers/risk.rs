//! Per-tick risk checks
//!
//! Compares each tick to the previous one for the same symbol. The first
//! tick for a symbol only sets the baseline.

use super::{Subscriber, SubscriberError};
use crate::protocol::Tick;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

pub const DEFAULT_PRICE_DEVIATION_LIMIT: f64 = 10.0;
pub const DEFAULT_VOLUME_SPIKE_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    /// Max absolute price move between ticks, in percent
    pub price_deviation_limit: f64,
    /// Max ratio of current size to previous size
    pub volume_spike_threshold: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            price_deviation_limit: DEFAULT_PRICE_DEVIATION_LIMIT,
            volume_spike_threshold: DEFAULT_VOLUME_SPIKE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskAlert {
    PriceDeviation { deviation_pct: f64 },
    VolumeSpike { ratio: f64 },
    CircuitBreaker { price: f64 },
}

#[derive(Debug, Clone, Copy)]
struct LastSeen {
    price: f64,
    size: i64,
}

pub struct RiskManager {
    limits: Mutex<RiskLimits>,
    last_seen: Mutex<HashMap<String, LastSeen>>,
    alerts: AtomicU64,
}

impl RiskManager {
    pub fn new() -> Self {
        Self::with_limits(RiskLimits::default())
    }

    pub fn with_limits(limits: RiskLimits) -> Self {
        RiskManager {
            limits: Mutex::new(limits),
            last_seen: Mutex::new(HashMap::new()),
            alerts: AtomicU64::new(0),
        }
    }

    pub fn set_price_deviation_limit(&self, limit: f64) {
        self.limits.lock().price_deviation_limit = limit;
        info!(limit, "price deviation limit updated");
    }

    pub fn set_volume_spike_threshold(&self, threshold: f64) {
        self.limits.lock().volume_spike_threshold = threshold;
        info!(threshold, "volume spike threshold updated");
    }

    pub fn limits(&self) -> RiskLimits {
        *self.limits.lock()
    }

    /// Run all checks for `tick` and record it as the new baseline
    pub fn check(&self, tick: &Tick) -> Vec<RiskAlert> {
        let limits = self.limits();
        let mut alerts = Vec::new();

        let previous = self.last_seen.lock().insert(
            tick.symbol.clone(),
            LastSeen { price: tick.price, size: tick.size },
        );

        if let Some(last) = previous {
            if last.price != 0.0 {
                let deviation_pct = ((tick.price - last.price) / last.price * 100.0).abs();
                if deviation_pct > limits.price_deviation_limit {
                    alerts.push(RiskAlert::PriceDeviation { deviation_pct });
                }
            }

            if last.size > 0 {
                let ratio = tick.size as f64 / last.size as f64;
                if ratio > limits.volume_spike_threshold {
                    alerts.push(RiskAlert::VolumeSpike { ratio });
                }
            }
        }

        if tick.price <= 0.0 {
            alerts.push(RiskAlert::CircuitBreaker { price: tick.price });
        }

        self.alerts.fetch_add(alerts.len() as u64, Ordering::Relaxed);
        alerts
    }

    pub fn alert_count(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }

    pub fn tracked_symbols(&self) -> usize {
        self.last_seen.lock().len()
    }
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for RiskManager {
    fn on_market_data(&self, tick: &Tick) -> Result<(), SubscriberError> {
        for alert in self.check(tick) {
            match alert {
                RiskAlert::PriceDeviation { deviation_pct } => {
                    warn!(symbol = %tick.symbol, deviation_pct, "risk alert: price deviation");
                }
                RiskAlert::VolumeSpike { ratio } => {
                    warn!(symbol = %tick.symbol, ratio, "risk alert: volume spike");
                }
                RiskAlert::CircuitBreaker { price } => {
                    warn!(symbol = %tick.symbol, price, "circuit breaker: invalid price");
                }
            }
        }
        Ok(())
    }
}
