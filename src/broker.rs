//! Thread-safe fan-out broker
//!
//! A single queue of envelopes drained by a fixed pool of worker threads.
//! Each worker takes one envelope at a time and hands the tick to every
//! registered subscriber in `SubscriberType` order before taking the next,
//! so per-message subscriber order is fixed while separate messages may
//! complete out of order across workers.
//!
//! `stop()` drains what was admitted before it was called. Ticks published
//! while the pool is stopping stay queued for the next `start()`.

use crate::protocol::Tick;
use crate::stats::{LatencyCounter, LatencyStats};
use crate::subscribers::{Subscriber, SubscriberType};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const MIN_WORKERS: usize = 2;
pub const DEFAULT_HIGH_LATENCY_MS: f64 = 1.0;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("queue full: {depth} messages pending")]
    QueueFull { depth: usize },

    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrokerConfig {
    /// Worker pool size; `None` uses available parallelism
    pub worker_threads: Option<usize>,
    /// Reject publishes beyond this many queued messages; `None` is unbounded
    pub max_queue_depth: Option<usize>,
    /// Dispatches slower than this are logged individually
    pub high_latency_threshold: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            worker_threads: None,
            max_queue_depth: None,
            high_latency_threshold: Duration::from_secs_f64(DEFAULT_HIGH_LATENCY_MS / 1000.0),
        }
    }
}

impl BrokerConfig {
    fn pool_size(&self) -> usize {
        let n = self.worker_threads.unwrap_or_else(|| {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(MIN_WORKERS)
        });
        n.max(MIN_WORKERS)
    }

    pub fn is_high_latency(&self, latency: Duration) -> bool {
        latency > self.high_latency_threshold
    }
}

/// Tick plus its admission order and time
struct Envelope {
    seq: u64,
    tick: Tick,
    enqueued_at: Instant,
}

#[derive(Default)]
struct Queue {
    envelopes: VecDeque<Envelope>,
    next_seq: u64,
    /// Set by `stop()`: workers dispatch envelopes below this and then exit
    cutoff: Option<u64>,
}

enum Next {
    Dispatch(Envelope),
    Wait,
    Exit,
}

impl Queue {
    fn take_next(&mut self) -> Next {
        let front = self.envelopes.front().map(|e| e.seq);
        match (front, self.cutoff) {
            (Some(seq), Some(cutoff)) if seq >= cutoff => Next::Exit,
            (None, Some(_)) => Next::Exit,
            (Some(_), _) => self.envelopes.pop_front().map_or(Next::Wait, Next::Dispatch),
            (None, None) => Next::Wait,
        }
    }
}

struct Shared {
    config: BrokerConfig,
    queue: Mutex<Queue>,
    available: Condvar,
    subscribers: RwLock<BTreeMap<SubscriberType, Arc<dyn Subscriber>>>,
    running: AtomicBool,
    latency: LatencyCounter,
    rejected: AtomicU64,
    subscriber_errors: AtomicU64,
    slow_dispatches: AtomicU64,
}

pub struct MessageBroker {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl MessageBroker {
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    pub fn with_config(config: BrokerConfig) -> Self {
        MessageBroker {
            shared: Arc::new(Shared {
                config,
                queue: Mutex::new(Queue::default()),
                available: Condvar::new(),
                subscribers: RwLock::new(BTreeMap::new()),
                running: AtomicBool::new(false),
                latency: LatencyCounter::new(),
                rejected: AtomicU64::new(0),
                subscriber_errors: AtomicU64::new(0),
                slow_dispatches: AtomicU64::new(0),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Register `subscriber` for `kind`, replacing any previous one
    pub fn subscribe(&self, kind: SubscriberType, subscriber: Arc<dyn Subscriber>) {
        let replaced = self.shared.subscribers.write().insert(kind, subscriber).is_some();
        info!(subscriber = %kind, replaced, "subscriber registered");
    }

    pub fn unsubscribe(&self, kind: SubscriberType) {
        if self.shared.subscribers.write().remove(&kind).is_some() {
            info!(subscriber = %kind, "subscriber unregistered");
        }
    }

    pub fn is_subscribed(&self, kind: SubscriberType) -> bool {
        self.shared.subscribers.read().contains_key(&kind)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// Queue `tick` for dispatch and wake one worker
    ///
    /// Never waits on subscribers. Accepted even when the pool is not
    /// running; queued messages are dispatched once it starts.
    pub fn publish(&self, tick: Tick) -> BrokerResult<()> {
        {
            let mut queue = self.shared.queue.lock();
            if let Some(max) = self.shared.config.max_queue_depth {
                if queue.envelopes.len() >= max {
                    self.shared.rejected.fetch_add(1, Ordering::Relaxed);
                    return Err(BrokerError::QueueFull { depth: queue.envelopes.len() });
                }
            }
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.envelopes.push_back(Envelope {
                seq,
                tick,
                enqueued_at: Instant::now(),
            });
        }
        self.shared.available.notify_one();
        Ok(())
    }

    /// Spawn the worker pool; no-op when already running
    pub fn start(&self) -> BrokerResult<()> {
        let mut workers = self.workers.lock();
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shared.queue.lock().cutoff = None;

        let pool_size = self.shared.config.pool_size();
        for id in 0..pool_size {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("broker-worker-{id}"))
                .spawn(move || worker_loop(id, &shared));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!(error = %e, "failed to spawn broker worker");
                    drop(workers);
                    self.stop();
                    return Err(BrokerError::Spawn(e));
                }
            }
        }

        info!(workers = pool_size, "message broker started");
        Ok(())
    }

    /// Dispatch everything admitted so far, then stop the pool
    ///
    /// Ticks published after this call begins are left queued. No-op when
    /// already stopped.
    pub fn stop(&self) {
        let mut workers = self.workers.lock();
        if !self.shared.running.swap(false, Ordering::AcqRel) && workers.is_empty() {
            return;
        }

        {
            let mut queue = self.shared.queue.lock();
            queue.cutoff = Some(queue.next_seq);
            self.shared.available.notify_all();
        }

        for handle in workers.drain(..) {
            if handle.join().is_err() {
                error!("broker worker terminated abnormally");
            }
        }

        info!(
            dispatched = self.message_count(),
            pending = self.queue_depth(),
            "message broker stopped"
        );
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn queue_depth(&self) -> usize {
        self.shared.queue.lock().envelopes.len()
    }

    /// Messages dequeued and dispatched, counted once each
    pub fn message_count(&self) -> u64 {
        self.shared.latency.count()
    }

    /// Mean publish-to-dequeue latency in milliseconds
    pub fn average_latency_ms(&self) -> f64 {
        self.shared.latency.average_ms()
    }

    pub fn latency_stats(&self) -> Option<LatencyStats> {
        self.shared.latency.snapshot()
    }

    /// Publishes refused because the queue was at its bound
    pub fn rejected_count(&self) -> u64 {
        self.shared.rejected.load(Ordering::Relaxed)
    }

    /// Dispatches whose queue latency exceeded the configured threshold
    pub fn slow_dispatch_count(&self) -> u64 {
        self.shared.slow_dispatches.load(Ordering::Relaxed)
    }

    /// Subscriber invocations that returned an error or panicked
    pub fn subscriber_error_count(&self) -> u64 {
        self.shared.subscriber_errors.load(Ordering::Relaxed)
    }
}

impl Default for MessageBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MessageBroker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(id: usize, shared: &Shared) {
    debug!(worker = id, "broker worker started");

    loop {
        let envelope = {
            let mut queue = shared.queue.lock();
            loop {
                match queue.take_next() {
                    Next::Dispatch(envelope) => break envelope,
                    Next::Wait => shared.available.wait(&mut queue),
                    Next::Exit => {
                        debug!(worker = id, "broker worker exiting");
                        return;
                    }
                }
            }
        };

        let latency = envelope.enqueued_at.elapsed();
        dispatch(shared, &envelope.tick);
        shared.latency.record(latency);

        if shared.config.is_high_latency(latency) {
            shared.slow_dispatches.fetch_add(1, Ordering::Relaxed);
            warn!(
                worker = id,
                symbol = %envelope.tick.symbol,
                latency_ms = latency.as_secs_f64() * 1000.0,
                "high latency detected"
            );
        }
    }
}

fn dispatch(shared: &Shared, tick: &Tick) {
    let subscribers: Vec<(SubscriberType, Arc<dyn Subscriber>)> = shared
        .subscribers
        .read()
        .iter()
        .map(|(kind, sub)| (*kind, Arc::clone(sub)))
        .collect();

    for (kind, subscriber) in subscribers {
        match panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_market_data(tick))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                shared.subscriber_errors.fetch_add(1, Ordering::Relaxed);
                error!(subscriber = %kind, symbol = %tick.symbol, error = %e, "subscriber failed");
            }
            Err(_) => {
                shared.subscriber_errors.fetch_add(1, Ordering::Relaxed);
                error!(subscriber = %kind, symbol = %tick.symbol, "subscriber panicked");
            }
        }
    }
}
