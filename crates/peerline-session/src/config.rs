//! Session configuration.
//!
//! The startup collaborator supplies the local display name, the listen port
//! and an optional bootstrap peer. Deadlines and framing limits have
//! defaults suitable for a small interactive chat.

use std::time::Duration;

use peerline_proto::DEFAULT_MAX_LINE_LEN;
use thiserror::Error;

/// Sentinel meaning "do not dial a bootstrap peer".
pub const NO_BOOTSTRAP: &str = "-";

/// Invalid configuration supplied by the startup collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The display name would break line framing.
    #[error("invalid nickname {0:?}: must not contain line breaks")]
    InvalidNickname(String),

    /// A peer address was empty or otherwise unusable.
    #[error("invalid address {addr:?}: {reason}")]
    InvalidAddress {
        /// Address as supplied
        addr: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Configuration for one [`crate::Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Display name announced in our handshake line
    pub nickname: String,
    /// Deadline for establishing an outbound connection
    pub connect_timeout: Duration,
    /// Deadline for a single line write (handshake or fan-out)
    pub write_timeout: Duration,
    /// Longest accepted incoming line, terminator excluded
    pub max_line_len: usize,
    /// Pause after a failed accept before accepting again
    pub accept_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            nickname: String::new(),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            accept_backoff: Duration::from_millis(100),
        }
    }
}

impl SessionConfig {
    /// Default configuration with the given display name.
    pub fn new(nickname: impl Into<String>) -> Self {
        Self { nickname: nickname.into(), ..Self::default() }
    }

    /// Reject settings that cannot work on the wire.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nickname.contains(['\n', '\r']) {
            return Err(ConfigError::InvalidNickname(self.nickname.clone()));
        }
        Ok(())
    }
}

/// Optional peer to dial at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    /// Start with no peers and wait for inbound links.
    None,
    /// Dial this `host:port` once at startup.
    Peer(String),
}

impl Bootstrap {
    /// Parse the startup argument, honouring the [`NO_BOOTSTRAP`] sentinel.
    pub fn parse(arg: &str) -> Result<Self, ConfigError> {
        let arg = arg.trim();
        if arg == NO_BOOTSTRAP {
            return Ok(Self::None);
        }
        if arg.is_empty() {
            return Err(ConfigError::InvalidAddress {
                addr: arg.to_string(),
                reason: format!("empty address (use {NO_BOOTSTRAP:?} for no bootstrap peer)"),
            });
        }
        Ok(Self::Peer(arg.to_string()))
    }
}
