//! Plain-text console: user commands in, rendered session events out.

use std::io;

use peerline_session::{FanOut, SessionEvent};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send to every peer.
    Broadcast(String),
    /// Send to every peer with this name.
    SendTo {
        /// Target display name
        name: String,
        /// Message text
        text: String,
    },
    /// Show the current peer list.
    Peers,
    /// Leave.
    Quit,
    /// Nothing to do (blank line).
    Empty,
    /// A slash command we could not make sense of.
    Invalid(String),
}

impl Command {
    /// Interpret one input line.
    pub fn parse(input: &str) -> Self {
        if input.trim().is_empty() {
            return Self::Empty;
        }

        let Some(rest) = input.strip_prefix('/') else {
            return Self::Broadcast(input.to_string());
        };

        let (cmd, args) = rest.split_once(' ').unwrap_or((rest, ""));
        match cmd {
            "peers" => Self::Peers,
            "quit" | "exit" => Self::Quit,
            "to" => match args.trim_start().split_once(' ') {
                Some((name, text)) if !text.trim().is_empty() => {
                    Self::SendTo { name: name.to_string(), text: text.to_string() }
                },
                _ => Self::Invalid("usage: /to <name> <message>".to_string()),
            },
            other => Self::Invalid(format!("unknown command: /{other}")),
        }
    }
}

/// Render a session event for display. `None` for events not shown.
pub fn render(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::MessageReceived { sender, text, .. } => {
            Some(format!("[ {sender} ]: {text}"))
        },
        SessionEvent::PeerConnected { name, .. } => Some(format!("[ {name} connected]")),
        SessionEvent::PeerDisconnected { name, .. } => Some(format!("[ {name} disconnected]")),
        SessionEvent::PeersChanged { .. } | SessionEvent::AcceptFailed { .. } => None,
    }
}

/// Render the peer list.
pub fn render_peers(names: &[String]) -> String {
    if names.is_empty() {
        return "Peers: (none)".to_string();
    }
    format!("Peers: {}", names.join(", "))
}

/// Render the outcome of `/to <name> <text>`.
pub fn render_unicast(name: &str, text: &str, report: FanOut) -> String {
    if report.targets() == 0 {
        format!("No peer named {name}")
    } else if report.delivered == 0 {
        format!("Lost connection to {name}, message not delivered")
    } else {
        format!("[ You -> {name} ]: {text}")
    }
}

/// Line-oriented output.
pub struct Console<W> {
    out: W,
}

impl<W> Console<W>
where
    W: AsyncWrite + Unpin,
{
    /// Write to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write one line and flush.
    pub async fn line(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }

    /// Consume the console, returning the writer.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
