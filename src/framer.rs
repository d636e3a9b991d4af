//! Line framing over a byte stream
//!
//! Socket reads land on arbitrary boundaries. The framer keeps whatever
//! trails the last delimiter and hands out only complete records.

use crate::protocol::RECORD_DELIMITER;

const INITIAL_CAPACITY: usize = 8192;

#[derive(Debug, Clone)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        LineFramer {
            buffer: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append `bytes` and call `callback` for each complete record
    ///
    /// Records are passed without the delimiter (and without a trailing
    /// `\r`). Empty records are skipped. Returns the number of records
    /// handed to the callback.
    pub fn push<F>(&mut self, bytes: &[u8], mut callback: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        self.buffer.extend_from_slice(bytes);

        let mut offset = 0;
        let mut count = 0;

        while let Some(pos) = self.buffer[offset..].iter().position(|&b| b == RECORD_DELIMITER) {
            let end = offset + pos;
            let mut record = &self.buffer[offset..end];
            if let [rest @ .., b'\r'] = record {
                record = rest;
            }
            offset = end + 1;

            if record.is_empty() {
                continue;
            }
            callback(record);
            count += 1;
        }

        if offset > 0 {
            self.buffer.drain(..offset);
        }

        count
    }

    /// Bytes held back waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial record
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(framer: &mut LineFramer, bytes: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        framer.push(bytes, |r| out.push(String::from_utf8_lossy(r).into_owned()));
        out
    }

    #[test]
    fn test_single_record() {
        let mut framer = LineFramer::new();
        assert_eq!(collect(&mut framer, b"AAPL,1,2,t\n"), vec!["AAPL,1,2,t"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_partial_record_held() {
        let mut framer = LineFramer::new();
        assert!(collect(&mut framer, b"AAPL,100.").is_empty());
        assert_eq!(framer.pending(), 9);
        assert_eq!(collect(&mut framer, b"5,10,t1\n"), vec!["AAPL,100.5,10,t1"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_empty_records_skipped() {
        let mut framer = LineFramer::new();
        let records = collect(&mut framer, b"\n\r\nA,1,1,t\n\n");
        assert_eq!(records, vec!["A,1,1,t"]);
    }

    #[test]
    fn test_crlf_stripped() {
        let mut framer = LineFramer::new();
        assert_eq!(collect(&mut framer, b"A,1,1,t\r\n"), vec!["A,1,1,t"]);
    }

    #[test]
    fn test_reset() {
        let mut framer = LineFramer::new();
        collect(&mut framer, b"partial");
        framer.reset();
        assert_eq!(framer.pending(), 0);
    }
}
