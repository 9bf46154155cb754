//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while splitting a byte stream into lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A line grew past the configured limit without a terminator.
    ///
    /// Fatal for the connection: the stream cannot be resynchronised without
    /// discarding an unknown amount of data.
    #[error("line too long: {len} bytes (max {max})")]
    LineTooLong {
        /// Bytes buffered so far for the offending line
        len: usize,
        /// Configured maximum line length
        max: usize,
    },
}
