//! Tick record decoder
//!
//! Decodes one already-framed record (no trailing delimiter) into a `Tick`.
//! A record either yields a fully populated tick or an error; nothing partial
//! escapes.

use crate::protocol::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("missing field `{field}` in record: {line}")]
    MissingField { field: &'static str, line: String },

    #[error("invalid price literal: {value:?}")]
    InvalidPrice { value: String },

    #[error("invalid size literal: {value:?}")]
    InvalidSize { value: String },

    #[error("record is not valid UTF-8")]
    InvalidUtf8,
}

pub type DecodeResult<T> = Result<T, DecodeError>;

const FIELD_NAMES: [&str; FIELD_COUNT] = ["symbol", "price", "size", "timestamp"];

/// Decode a single `symbol,price,size,timestamp` record
///
/// The timestamp is whatever follows the third separator, so extra
/// separators after it stay inside the timestamp string. It must not be
/// empty.
pub fn decode_tick(line: &str) -> DecodeResult<Tick> {
    let mut fields = line.splitn(FIELD_COUNT, FIELD_SEPARATOR);

    let mut next_field = |idx: usize| {
        fields.next().ok_or_else(|| DecodeError::MissingField {
            field: FIELD_NAMES[idx],
            line: line.to_string(),
        })
    };

    let symbol = next_field(0)?;
    let price_str = next_field(1)?;
    let size_str = next_field(2)?;
    let timestamp = next_field(3)?;
    if timestamp.is_empty() {
        return Err(DecodeError::MissingField {
            field: FIELD_NAMES[3],
            line: line.to_string(),
        });
    }

    let price = price_str.trim().parse::<f64>().map_err(|_| DecodeError::InvalidPrice {
        value: price_str.to_string(),
    })?;
    let size = size_str.trim().parse::<i64>().map_err(|_| DecodeError::InvalidSize {
        value: size_str.to_string(),
    })?;

    Ok(Tick {
        symbol: symbol.to_string(),
        price,
        size,
        timestamp: timestamp.to_string(),
    })
}

/// Decode raw record bytes, rejecting anything that is not UTF-8
pub fn decode_record(record: &[u8]) -> DecodeResult<Tick> {
    let line = std::str::from_utf8(record).map_err(|_| DecodeError::InvalidUtf8)?;
    decode_tick(line)
}
