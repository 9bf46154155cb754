//! Peerline wire protocol.
//!
//! Peers talk over raw TCP using newline-terminated text lines. There is no
//! length prefix, no escaping and no encoding negotiation. A line starting
//! with [`HANDSHAKE_PREFIX`] announces the sender's display name; every other
//! line is opaque chat text.
//!
//! ```text
//! NICKNAME|alice\n
//! hello everyone\n
//! ```
//!
//! # Components
//!
//! - [`Line`]: a classified protocol line (handshake or chat)
//! - [`LineDecoder`]: Sans-IO splitter that turns buffered bytes into lines

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod decoder;
mod errors;
mod line;

pub use decoder::LineDecoder;
pub use errors::{ProtocolError, Result};
pub use line::{
    DEFAULT_MAX_LINE_LEN, HANDSHAKE_PREFIX, LINE_TERMINATOR, Line, contains_line_break,
    strip_terminator,
};
