//! Tick consumers registered with the broker
//!
//! The consumer set is closed: one slot per `SubscriberType`. Each
//! implementation guards its own state and must tolerate concurrent calls
//! from any broker worker.

pub mod analytics;
pub mod risk;
pub mod trading;

use crate::protocol::Tick;
use std::fmt;
use thiserror::Error;

pub use analytics::{Analytics, AnalyticsReport, SymbolReport};
pub use risk::{RiskAlert, RiskLimits, RiskManager};
pub use trading::{SignalCounts, TradingAlgorithm, TradingSignal};

/// Registry slot; declaration order is dispatch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberType {
    TradingAlgorithm,
    RiskManagement,
    Analytics,
}

impl SubscriberType {
    pub const ALL: [SubscriberType; 3] = [
        SubscriberType::TradingAlgorithm,
        SubscriberType::RiskManagement,
        SubscriberType::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberType::TradingAlgorithm => "trading",
            SubscriberType::RiskManagement => "risk",
            SubscriberType::Analytics => "analytics",
        }
    }
}

impl fmt::Display for SubscriberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubscriberError {
    #[error("tick rejected: {0}")]
    Rejected(String),
}

/// Capability to consume one tick
pub trait Subscriber: Send + Sync {
    fn on_market_data(&self, tick: &Tick) -> Result<(), SubscriberError>;
}

impl<F> Subscriber for F
where
    F: Fn(&Tick) -> Result<(), SubscriberError> + Send + Sync,
{
    fn on_market_data(&self, tick: &Tick) -> Result<(), SubscriberError> {
        self(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_order_follows_declaration() {
        let mut types = vec![
            SubscriberType::Analytics,
            SubscriberType::TradingAlgorithm,
            SubscriberType::RiskManagement,
        ];
        types.sort();
        assert_eq!(types, SubscriberType::ALL.to_vec());
    }

    #[test]
    fn test_closure_subscriber() {
        let sub = |tick: &Tick| {
            if tick.price > 0.0 {
                Ok(())
            } else {
                Err(SubscriberError::Rejected("non-positive".into()))
            }
        };
        assert!(sub.on_market_data(&Tick::new("A", 1.0, 1, "t")).is_ok());
        assert!(sub.on_market_data(&Tick::new("A", 0.0, 1, "t")).is_err());
    }
}
