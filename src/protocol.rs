//! Text tick format
//!
//! One record per line, four comma-separated fields:
//!   symbol,price,size,timestamp\n
//!
//!   - symbol: short instrument identifier
//!   - price: decimal literal
//!   - size: integer literal
//!   - timestamp: opaque remainder of the line, kept verbatim

use std::fmt;

pub const RECORD_DELIMITER: u8 = b'\n';
pub const FIELD_SEPARATOR: char = ',';

/// Number of fields in a well-formed record
pub const FIELD_COUNT: usize = 4;

/// Single market data observation
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub size: i64,
    pub timestamp: String,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, size: i64, timestamp: impl Into<String>) -> Self {
        Tick {
            symbol: symbol.into(),
            price,
            size,
            timestamp: timestamp.into(),
        }
    }

    /// Render as a wire record, including the trailing delimiter
    pub fn to_wire(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.symbol, self.price, self.size, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wire() {
        let tick = Tick::new("AAPL", 150.25, 300, "2024-01-02T09:30:00Z");
        assert_eq!(tick.to_wire(), "AAPL,150.25,300,2024-01-02T09:30:00Z\n");
    }

    #[test]
    fn test_display_has_no_delimiter() {
        let tick = Tick::new("MSFT", 1.0, 1, "t");
        assert!(!tick.to_string().contains('\n'));
    }
}
