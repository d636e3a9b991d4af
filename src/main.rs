use market_feed::{
    Analytics, AppConfig, FeedHandler, MessageBroker, RateMeter, RiskManager, SubscriberType,
    TradingAlgorithm,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "market-feed.toml";
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const HIGH_THROUGHPUT_MSG_PER_SEC: f64 = 10_000.0;

fn load_config() -> Result<AppConfig, market_feed::ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AppConfig::load(DEFAULT_CONFIG_PATH),
        None => Ok(AppConfig::default()),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {e}");
            if let Some(source) = std::error::Error::source(&e) {
                eprintln!("  caused by: {source}");
            }
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_level);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "market feed terminated");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let broker = Arc::new(MessageBroker::with_config(config.broker_config()));

    let trading = Arc::new(TradingAlgorithm::new());
    for symbol in &config.trading.symbols {
        trading.add_symbol(symbol);
    }
    let risk = Arc::new(RiskManager::with_limits(config.risk_limits()));
    let analytics = Arc::new(Analytics::new());

    broker.subscribe(SubscriberType::TradingAlgorithm, trading.clone());
    broker.subscribe(SubscriberType::RiskManagement, risk.clone());
    broker.subscribe(SubscriberType::Analytics, analytics.clone());
    broker.start()?;

    let feed = FeedHandler::new(config.feed.host.clone(), config.feed.port);
    feed.set_message_broker(Arc::clone(&broker));
    if let Err(e) = feed.start() {
        broker.stop();
        return Err(e.into());
    }

    let started = Instant::now();
    let interval = config.report_interval();
    let mut next_report = started + interval;
    let mut rate = RateMeter::new();

    loop {
        thread::sleep(POLL_INTERVAL);

        if Instant::now() >= next_report {
            report(started, &feed, &broker, &trading, &risk, &mut rate);
            next_report += interval;
        }

        if !feed.is_running() {
            info!("feed disconnected, shutting down");
            break;
        }
        if config.run_duration().is_some_and(|limit| started.elapsed() >= limit) {
            info!("run duration reached, shutting down");
            break;
        }
    }

    feed.stop();
    broker.stop();

    report(started, &feed, &broker, &trading, &risk, &mut rate);
    analytics.generate_report();
    Ok(())
}

fn report(
    started: Instant,
    feed: &FeedHandler,
    broker: &MessageBroker,
    trading: &TradingAlgorithm,
    risk: &RiskManager,
    rate: &mut RateMeter,
) {
    let processed = feed.messages_processed();
    let msg_per_sec = rate.sample(processed);
    let avg_latency_ms = broker.average_latency_ms();
    let signals = trading.signal_counts();

    info!(
        runtime_secs = started.elapsed().as_secs(),
        processed,
        dispatched = broker.message_count(),
        queue_depth = broker.queue_depth(),
        parse_errors = feed.parse_errors(),
        dropped = feed.dropped_count(),
        msg_per_sec = msg_per_sec.round(),
        avg_latency_ms,
        avg_processing_ms = feed.average_processing_time_ms(),
        buy_signals = signals.buys,
        sell_signals = signals.sells,
        risk_alerts = risk.alert_count(),
        "performance stats"
    );

    if msg_per_sec > HIGH_THROUGHPUT_MSG_PER_SEC {
        info!(msg_per_sec = msg_per_sec.round(), "high throughput achieved");
    }
    if avg_latency_ms > 0.0 && avg_latency_ms < 1.0 {
        info!(avg_latency_ms, "sub-millisecond latency achieved");
    }
}
