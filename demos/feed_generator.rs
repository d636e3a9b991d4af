//! Synthetic market data feed server
//!
//! Listens on a TCP port and streams random text ticks to the first client
//! that connects. Point `market-feed` at it to exercise the whole pipeline.
//!
//! Usage: feed_generator [port] [message_count] [messages_per_sec]
//! A rate of 0 sends as fast as the socket accepts.

use rand::Rng;
use std::env;
use std::io::{BufWriter, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const UNIVERSE: [(&str, f64); 8] = [
    ("AAPL", 150.0),
    ("GOOGL", 2800.0),
    ("MSFT", 350.0),
    ("TSLA", 200.0),
    ("AMZN", 3000.0),
    ("META", 300.0),
    ("NVDA", 400.0),
    ("NFLX", 400.0),
];

fn arg_or<T: std::str::FromStr>(args: &[String], idx: usize, default: T) -> T {
    args.get(idx).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let port: u16 = arg_or(&args, 1, 9000);
    let message_count: u64 = arg_or(&args, 2, 10_000);
    let rate: u64 = arg_or(&args, 3, 1_000);

    let listener = TcpListener::bind(("127.0.0.1", port))?;
    println!("Waiting for feed handler on 127.0.0.1:{}", port);

    let (conn, peer) = listener.accept()?;
    conn.set_nodelay(true)?;
    println!("Client {} connected, sending {} messages at {}/s", peer, message_count, rate);

    let mut output = BufWriter::new(conn);
    let mut rng = rand::thread_rng();
    let interval = (rate > 0).then(|| Duration::from_secs_f64(1.0 / rate as f64));
    let started = Instant::now();

    for seq in 1..=message_count {
        let (symbol, base) = UNIVERSE[rng.gen_range(0..UNIVERSE.len())];
        let price = base * (1.0 + rng.gen_range(-0.02..0.02));
        let volume = rng.gen_range(100..=5000);

        writeln!(output, "{},{:.2},{},{},{}", symbol, price, volume, epoch_millis(), seq)?;

        if let Some(interval) = interval {
            output.flush()?;
            let due = started + interval.mul_f64(seq as f64);
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }

        if seq % 1000 == 0 {
            println!("Sent {} messages", seq);
        }
    }

    output.flush()?;

    let elapsed = started.elapsed();
    println!(
        "Done: {} messages in {:.2}s ({:.0} msg/s)",
        message_count,
        elapsed.as_secs_f64(),
        message_count as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}
