//! TCP feed ingestion
//!
//! One reader thread per connection: read bytes, frame lines, decode ticks,
//! publish to the broker if one is attached. Without a broker the handler
//! still decodes and counts, which keeps it testable on its own.

use crate::broker::MessageBroker;
use crate::decoder::decode_record;
use crate::framer::LineFramer;
use crate::stats::{LatencyCounter, LatencyStats};
use parking_lot::{Mutex, RwLock};
use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const READ_BUFFER_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("socket error")]
    Io(#[from] io::Error),

    #[error("failed to spawn reader thread")]
    Spawn(#[source] io::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;

struct Inner {
    running: AtomicBool,
    broker: RwLock<Option<Arc<MessageBroker>>>,
    framer: Mutex<LineFramer>,
    processing: LatencyCounter,
    parse_errors: AtomicU64,
    dropped: AtomicU64,
}

impl Inner {
    fn ingest(&self, bytes: &[u8]) {
        let broker = self.broker.read().clone();
        let mut framer = self.framer.lock();

        framer.push(bytes, |record| {
            let start = Instant::now();

            let tick = match decode_record(record) {
                Ok(tick) => tick,
                Err(e) => {
                    self.parse_errors.fetch_add(1, Ordering::Relaxed);
                    debug!(error = %e, raw = %String::from_utf8_lossy(record), "dropping malformed record");
                    return;
                }
            };

            if let Some(broker) = &broker {
                if let Err(e) = broker.publish(tick) {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "tick dropped by broker");
                }
            }

            self.processing.record_since(start);
        });
    }
}

pub struct FeedHandler {
    host: String,
    port: u16,
    inner: Arc<Inner>,
    stream: Mutex<Option<TcpStream>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl FeedHandler {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        FeedHandler {
            host: host.into(),
            port,
            inner: Arc::new(Inner {
                running: AtomicBool::new(false),
                broker: RwLock::new(None),
                framer: Mutex::new(LineFramer::new()),
                processing: LatencyCounter::new(),
                parse_errors: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            stream: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Attach the broker decoded ticks are published to
    pub fn set_message_broker(&self, broker: Arc<MessageBroker>) {
        *self.inner.broker.write() = Some(broker);
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect and spawn the reader thread
    ///
    /// A failed connect leaves the handler stopped; retrying is up to the
    /// caller. Calling this while running does nothing.
    pub fn start(&self) -> FeedResult<()> {
        let mut reader = self.reader.lock();
        if self.inner.running.load(Ordering::Acquire) {
            return Ok(());
        }

        // Reap a reader that exited on disconnect
        if let Some(handle) = reader.take() {
            let _ = handle.join();
        }

        let addr = self.address();
        let stream = TcpStream::connect(&addr).map_err(|source| {
            error!(addr = %addr, error = %source, "feed connection failed");
            FeedError::Connect { addr: addr.clone(), source }
        })?;
        let control = stream.try_clone().map_err(|e| {
            error!(addr = %addr, error = %e, "failed to clone feed socket");
            let _ = stream.shutdown(Shutdown::Both);
            FeedError::Io(e)
        })?;

        self.inner.framer.lock().reset();
        self.inner.running.store(true, Ordering::Release);

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("feed-reader".into())
            .spawn(move || read_loop(&inner, stream));

        match spawned {
            Ok(handle) => {
                *reader = Some(handle);
                *self.stream.lock() = Some(control);
                info!(addr = %addr, "feed handler started");
                Ok(())
            }
            Err(e) => {
                self.inner.running.store(false, Ordering::Release);
                let _ = control.shutdown(Shutdown::Both);
                Err(FeedError::Spawn(e))
            }
        }
    }

    /// Close the connection and wait for the reader to exit
    ///
    /// Once this returns no further ticks are decoded or published.
    pub fn stop(&self) {
        let mut reader = self.reader.lock();
        let was_running = self.inner.running.swap(false, Ordering::AcqRel);

        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        if let Some(handle) = reader.take() {
            if handle.join().is_err() {
                error!("feed reader terminated abnormally");
            }
        }

        if was_running {
            info!(processed = self.messages_processed(), "feed handler stopped");
        }
    }

    /// Run raw bytes through the framing/decode/publish pipeline
    pub fn ingest(&self, bytes: &[u8]) {
        self.inner.ingest(bytes);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Ticks decoded and handed to the broker
    pub fn messages_processed(&self) -> u64 {
        self.inner.processing.count()
    }

    /// Mean decode+publish time per tick in milliseconds
    pub fn average_processing_time_ms(&self) -> f64 {
        self.inner.processing.average_ms()
    }

    pub fn processing_stats(&self) -> Option<LatencyStats> {
        self.inner.processing.snapshot()
    }

    /// Records dropped as malformed
    pub fn parse_errors(&self) -> u64 {
        self.inner.parse_errors.load(Ordering::Relaxed)
    }

    /// Ticks the broker refused
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for FeedHandler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(inner: &Inner, mut stream: TcpStream) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    while inner.running.load(Ordering::Acquire) {
        match stream.read(&mut buffer) {
            Ok(0) => {
                if inner.running.load(Ordering::Acquire) {
                    warn!("feed connection closed by peer");
                }
                break;
            }
            Ok(n) => inner.ingest(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if inner.running.load(Ordering::Acquire) {
                    warn!(error = %e, "feed read failed");
                }
                break;
            }
        }
    }

    inner.running.store(false, Ordering::Release);
    debug!("feed reader exiting");
}
