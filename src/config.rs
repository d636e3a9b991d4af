//! Runtime settings for the `market-feed` binary
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use crate::broker::BrokerConfig;
use crate::subscribers::RiskLimits;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default = "defaults::report_interval_secs")]
    pub report_interval_secs: u64,
    #[serde(default)]
    pub run_duration_secs: Option<u64>,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub trading: TradingSettings,
    #[serde(default)]
    pub risk: RiskSettings,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeedSettings {
    #[serde(default = "defaults::host")]
    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BrokerSettings {
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default)]
    pub max_queue_depth: Option<usize>,
    #[serde(default = "defaults::high_latency_threshold_ms")]
    pub high_latency_threshold_ms: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TradingSettings {
    #[serde(default = "defaults::symbols")]
    pub symbols: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RiskSettings {
    #[serde(default = "defaults::price_deviation_limit")]
    pub price_deviation_limit: f64,
    #[serde(default = "defaults::volume_spike_threshold")]
    pub volume_spike_threshold: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

mod defaults {
    pub fn log_level() -> String {
        "info".into()
    }

    pub fn report_interval_secs() -> u64 {
        5
    }

    pub fn host() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        9000
    }

    pub fn high_latency_threshold_ms() -> f64 {
        crate::broker::DEFAULT_HIGH_LATENCY_MS
    }

    pub fn symbols() -> Vec<String> {
        ["AAPL", "GOOGL", "MSFT"].iter().map(|s| s.to_string()).collect()
    }

    pub fn price_deviation_limit() -> f64 {
        crate::subscribers::risk::DEFAULT_PRICE_DEVIATION_LIMIT
    }

    pub fn volume_spike_threshold() -> f64 {
        crate::subscribers::risk::DEFAULT_VOLUME_SPIKE_THRESHOLD
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        BrokerSettings {
            worker_threads: None,
            max_queue_depth: None,
            high_latency_threshold_ms: defaults::high_latency_threshold_ms(),
        }
    }
}

impl Default for TradingSettings {
    fn default() -> Self {
        TradingSettings {
            symbols: defaults::symbols(),
        }
    }
}

impl Default for RiskSettings {
    fn default() -> Self {
        RiskSettings {
            price_deviation_limit: defaults::price_deviation_limit(),
            volume_spike_threshold: defaults::volume_spike_threshold(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: defaults::log_level(),
            report_interval_secs: defaults::report_interval_secs(),
            run_duration_secs: None,
            feed: FeedSettings::default(),
            broker: BrokerSettings::default(),
            trading: TradingSettings::default(),
            risk: RiskSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.report_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "report_interval_secs",
                reason: "must be positive".into(),
            });
        }
        if self.broker.high_latency_threshold_ms.is_nan() || self.broker.high_latency_threshold_ms < 0.0 {
            return Err(ConfigError::Invalid {
                field: "broker.high_latency_threshold_ms",
                reason: "must be non-negative".into(),
            });
        }
        if self.broker.max_queue_depth == Some(0) {
            return Err(ConfigError::Invalid {
                field: "broker.max_queue_depth",
                reason: "must be positive when set".into(),
            });
        }
        if self.risk.price_deviation_limit.is_nan() || self.risk.price_deviation_limit <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "risk.price_deviation_limit",
                reason: "must be positive".into(),
            });
        }
        if self.risk.volume_spike_threshold.is_nan() || self.risk.volume_spike_threshold <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "risk.volume_spike_threshold",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            worker_threads: self.broker.worker_threads,
            max_queue_depth: self.broker.max_queue_depth,
            high_latency_threshold: Duration::from_secs_f64(self.broker.high_latency_threshold_ms / 1000.0),
        }
    }

    pub fn risk_limits(&self) -> RiskLimits {
        RiskLimits {
            price_deviation_limit: self.risk.price_deviation_limit,
            volume_spike_threshold: self.risk.volume_spike_threshold,
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn run_duration(&self) -> Option<Duration> {
        self.run_duration_secs.map(Duration::from_secs)
    }
}
