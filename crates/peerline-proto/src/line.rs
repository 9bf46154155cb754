//! Line classification and encoding.

use bytes::{BufMut, Bytes, BytesMut};

/// Prefix that marks a handshake line. The rest of the line is the name.
pub const HANDSHAKE_PREFIX: &str = "NICKNAME|";

/// Terminator appended to every outgoing line.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Default upper bound for a single incoming line (64 KiB).
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// A single protocol line.
///
/// # Invariants
///
/// - Parsing never fails: any byte sequence is either a handshake or a chat
///   line. Invalid UTF-8 is replaced, not rejected.
/// - Encoding appends exactly one [`LINE_TERMINATOR`]. Content is written
///   verbatim, so a payload holding `\n` reaches the remote as several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Announces the sender's display name.
    Handshake {
        /// Display name, verbatim up to the end of the line
        name: String,
    },

    /// Opaque chat text.
    Chat {
        /// Message text without the terminator
        text: String,
    },
}

impl Line {
    /// Build a handshake line.
    pub fn handshake(name: impl Into<String>) -> Self {
        Self::Handshake { name: name.into() }
    }

    /// Build a chat line.
    pub fn chat(text: impl Into<String>) -> Self {
        Self::Chat { text: text.into() }
    }

    /// Classify one raw line.
    ///
    /// A trailing `\n` and a `\r` before it are dropped first, so CRLF peers
    /// interoperate.
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(strip_terminator(raw));
        match text.strip_prefix(HANDSHAKE_PREFIX) {
            Some(name) => Self::Handshake { name: name.to_owned() },
            None => Self::Chat { text: text.into_owned() },
        }
    }

    /// Whether this line announces a display name.
    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Handshake { .. })
    }

    /// Write the line and its terminator into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        match self {
            Self::Handshake { name } => {
                dst.put_slice(HANDSHAKE_PREFIX.as_bytes());
                dst.put_slice(name.as_bytes());
            },
            Self::Chat { text } => dst.put_slice(text.as_bytes()),
        }
        dst.put_u8(LINE_TERMINATOR);
    }

    /// Number of bytes [`Line::encode`] writes.
    pub fn encoded_len(&self) -> usize {
        let body = match self {
            Self::Handshake { name } => HANDSHAKE_PREFIX.len() + name.len(),
            Self::Chat { text } => text.len(),
        };
        body + 1
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Drop one trailing `\n` and then one trailing `\r`, if present.
pub fn strip_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

/// Whether `text` would be split into several lines on the wire.
pub fn contains_line_break(text: &str) -> bool {
    text.contains('\n')
}
