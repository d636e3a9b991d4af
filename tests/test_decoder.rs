//! Wire conformance: framing and decoding of tick records

use market_feed::{decode_record, decode_tick, DecodeError, LineFramer, Tick};

fn frame_all(framer: &mut LineFramer, bytes: &[u8]) -> Vec<Result<Tick, DecodeError>> {
    let mut out = Vec::new();
    framer.push(bytes, |record| out.push(decode_record(record)));
    out
}

#[test]
fn test_valid_record_fields_exact() {
    let cases = [
        ("AAPL", "150.25", 100, "2024-01-02T09:30:00.123456Z"),
        ("GOOGL", "2800", 1, "t"),
        ("X", "-3.5", -7, "anything goes: here"),
        ("MSFT", "1e3", 0, "1700000000000"),
    ];

    for (symbol, price, size, ts) in cases {
        let line = format!("{symbol},{price},{size},{ts}");
        let tick = decode_tick(&line).unwrap();
        assert_eq!(tick.symbol, symbol);
        assert_eq!(tick.price, price.parse::<f64>().unwrap());
        assert_eq!(tick.size, size);
        assert_eq!(tick.timestamp, ts);
    }
}

#[test]
fn test_missing_fields() {
    for line in ["AAPL", "AAPL,1.0", "AAPL,1.0,5", "AAPL,1.0,5,"] {
        let result = decode_tick(line);
        assert!(
            matches!(result, Err(DecodeError::MissingField { .. })),
            "{line:?} should be missing a field"
        );
    }
}

#[test]
fn test_non_numeric_price() {
    for price in ["abc", "", "1.2.3", "12x"] {
        let line = format!("AAPL,{price},100,t");
        assert!(matches!(decode_tick(&line), Err(DecodeError::InvalidPrice { .. })));
    }
}

#[test]
fn test_non_numeric_size() {
    for size in ["abc", "", "10.5", "1e3"] {
        let line = format!("AAPL,1.0,{size},t");
        assert!(matches!(decode_tick(&line), Err(DecodeError::InvalidSize { .. })));
    }
}

#[test]
fn test_malformed_does_not_poison_stream() {
    let mut framer = LineFramer::new();
    let results = frame_all(&mut framer, b"AAPL,abc,1,t\nMSFT,1.5,10,t2\nbroken\nTSLA,2,3,t3\n");

    assert_eq!(results.len(), 4);
    assert!(results[0].is_err());
    assert_eq!(results[1].as_ref().unwrap(), &Tick::new("MSFT", 1.5, 10, "t2"));
    assert!(results[2].is_err());
    assert_eq!(results[3].as_ref().unwrap(), &Tick::new("TSLA", 2.0, 3, "t3"));
}

#[test]
fn test_partial_record_across_reads() {
    let mut framer = LineFramer::new();
    assert!(frame_all(&mut framer, b"AAPL,100.").is_empty());

    let results = frame_all(&mut framer, b"5,10,t1\n");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap(), &Tick::new("AAPL", 100.5, 10, "t1"));
}

#[test]
fn test_byte_at_a_time() {
    let wire = b"AAPL,150.5,100,t1\nMSFT,300.25,50,t2\n";
    let mut framer = LineFramer::new();
    let mut ticks = Vec::new();

    for byte in wire.iter() {
        framer.push(std::slice::from_ref(byte), |r| ticks.push(decode_record(r).unwrap()));
    }

    assert_eq!(ticks, vec![
        Tick::new("AAPL", 150.5, 100, "t1"),
        Tick::new("MSFT", 300.25, 50, "t2"),
    ]);
    assert_eq!(framer.pending(), 0);
}

#[test]
fn test_generator_style_trailing_sequence() {
    let tick = decode_tick("NVDA,401.12,2500,2024-01-02T09:30:00.000001Z,17").unwrap();
    assert_eq!(tick.timestamp, "2024-01-02T09:30:00.000001Z,17");
}

#[test]
fn test_to_wire_decodes_back() {
    let tick = Tick::new("AMZN", 3001.75, 4200, "2024-01-02T09:30:00Z");
    let mut framer = LineFramer::new();
    let results = frame_all(&mut framer, tick.to_wire().as_bytes());
    assert_eq!(results, vec![Ok(tick)]);
}
