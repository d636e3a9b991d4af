//! Feed handler against a loopback TCP server

use market_feed::{Analytics, FeedError, FeedHandler, MessageBroker, SubscriberType};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
    true
}

#[test]
fn test_connect_failure_stays_stopped() {
    // Bind then drop to get a port nothing listens on
    let (listener, port) = listener();
    drop(listener);

    let feed = FeedHandler::new("127.0.0.1", port);
    let result = feed.start();
    assert!(matches!(result, Err(FeedError::Connect { .. })));
    assert!(!feed.is_running());
}

#[test]
fn test_ticks_reach_broker_across_split_writes() {
    let (listener, port) = listener();

    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        conn.write_all(b"AAPL,150.5,100,t1\nMSFT,300.").unwrap();
        conn.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
        conn.write_all(b"25,50,t2\nbad,record\nGOOGL,2800,10,t3\n").unwrap();
        conn
    });

    let broker = Arc::new(MessageBroker::new());
    let analytics = Arc::new(Analytics::new());
    broker.subscribe(SubscriberType::Analytics, analytics.clone());
    broker.start().unwrap();

    let feed = FeedHandler::new("127.0.0.1", port);
    feed.set_message_broker(Arc::clone(&broker));
    feed.start().unwrap();
    assert!(feed.is_running());

    assert!(wait_until(|| feed.messages_processed() == 3 && feed.parse_errors() == 1));
    let _conn = server.join().unwrap();

    feed.stop();
    assert!(!feed.is_running());
    broker.stop();

    assert_eq!(broker.message_count(), 3);
    assert_eq!(analytics.total_messages(), 3);
    assert_eq!(analytics.average_price("MSFT"), Some(300.25));
    assert!(feed.average_processing_time_ms() >= 0.0);
}

#[test]
fn test_peer_close_ends_reader() {
    let (listener, port) = listener();

    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        conn.write_all(b"TSLA,200,5,t1\n").unwrap();
    });

    let feed = FeedHandler::new("127.0.0.1", port);
    feed.start().unwrap();
    server.join().unwrap();

    assert!(wait_until(|| !feed.is_running()));
    assert_eq!(feed.messages_processed(), 1);
    feed.stop();
}

#[test]
fn test_stop_unblocks_idle_reader() {
    let (listener, port) = listener();
    let server = thread::spawn(move || listener.accept().map(|(conn, _)| conn));

    let feed = FeedHandler::new("127.0.0.1", port);
    feed.start().unwrap();
    let _conn: TcpStream = server.join().unwrap().unwrap();

    let started = Instant::now();
    feed.stop();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!feed.is_running());

    feed.stop();
}

#[test]
fn test_restart_after_disconnect() {
    let (listener, port) = listener();

    let server = thread::spawn(move || {
        for i in 0..2 {
            let (mut conn, _) = listener.accept().unwrap();
            writeln!(conn, "AMZN,3000,{},t{}", i + 1, i).unwrap();
        }
    });

    let feed = FeedHandler::new("127.0.0.1", port);
    feed.start().unwrap();
    assert!(wait_until(|| !feed.is_running()));

    feed.start().unwrap();
    assert!(wait_until(|| !feed.is_running()));
    server.join().unwrap();

    assert_eq!(feed.messages_processed(), 2);
}
