//! Sans-IO line splitter.
//!
//! The caller owns the socket and the read buffer; [`LineDecoder`] only looks
//! at buffered bytes and splits complete lines off the front. This keeps the
//! framing logic free of any runtime and testable with plain byte slices.

use bytes::BytesMut;

use crate::{
    Line,
    errors::{ProtocolError, Result},
    line::LINE_TERMINATOR,
};

/// Splits a byte stream into [`Line`]s.
///
/// # Invariants
///
/// - A line is at most `max_len` bytes, terminator excluded. Longer input is
///   rejected with [`ProtocolError::LineTooLong`] as soon as it is detected.
/// - Bytes already scanned for a terminator are not scanned again on the next
///   call, so feeding a long line in small chunks stays linear.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    max_len: usize,
    /// Prefix of the buffer known to contain no terminator
    scanned: usize,
}

impl LineDecoder {
    /// Create a decoder accepting lines of up to `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self { max_len, scanned: 0 }
    }

    /// Configured maximum line length.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Split the next complete line off `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>> {
        let start = self.scanned.min(buf.len());

        if let Some(offset) = buf[start..].iter().position(|b| *b == LINE_TERMINATOR) {
            let end = start + offset;
            self.scanned = 0;

            if end > self.max_len {
                return Err(ProtocolError::LineTooLong { len: end, max: self.max_len });
            }

            let raw = buf.split_to(end + 1);
            return Ok(Some(Line::parse(&raw)));
        }

        self.scanned = buf.len();
        if buf.len() > self.max_len {
            return Err(ProtocolError::LineTooLong { len: buf.len(), max: self.max_len });
        }

        Ok(None)
    }

    /// Like [`LineDecoder::decode`], but at end of stream.
    ///
    /// A trailing line without terminator is still delivered.
    pub fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        if buf.is_empty() {
            return Ok(None);
        }

        self.scanned = 0;
        let raw = buf.split();
        Ok(Some(Line::parse(&raw)))
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_LINE_LEN)
    }
}
