//! Market Feed - Tick Ingestion and Fan-out
//!
//! Reads newline-delimited market data ticks from a TCP feed and distributes
//! every tick to a fixed set of concurrent consumers. Features include:
//! - Line framing across arbitrary read boundaries
//! - Strict CSV tick decoding with per-record error isolation
//! - Thread-pool broker with per-message ordered fan-out
//! - Trading, risk and analytics subscribers with independent state
//! - Lock-free latency and throughput statistics

pub mod protocol;
pub mod decoder;
pub mod framer;
pub mod feed;
pub mod broker;
pub mod subscribers;
pub mod stats;
pub mod config;

pub use protocol::Tick;
pub use decoder::{decode_record, decode_tick, DecodeError};
pub use framer::LineFramer;
pub use feed::{FeedError, FeedHandler};
pub use broker::{BrokerConfig, BrokerError, MessageBroker};
pub use subscribers::{
    Analytics, AnalyticsReport, RiskAlert, RiskLimits, RiskManager, Subscriber, SubscriberError,
    SubscriberType, SymbolReport, TradingAlgorithm, TradingSignal,
};
pub use stats::{LatencyCounter, LatencyStats, RateMeter};
pub use config::{AppConfig, ConfigError};
