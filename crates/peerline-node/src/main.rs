//! Peerline chat node.
//!
//! # Usage
//!
//! ```bash
//! # First node: listen on 9000, no bootstrap peer
//! peerline-node 9000 - alice
//!
//! # Second node: listen on 9001 and dial the first
//! peerline-node 9001 127.0.0.1:9000 bob
//! ```
//!
//! Type a line to broadcast it. `/to <name> <text>` sends to one name,
//! `/peers` lists peers, `/quit` leaves. Logs go to stderr.

mod console;

use std::time::Duration;

use clap::Parser;
use console::{Command, Console, render, render_peers, render_unicast};
use peerline_session::{Bootstrap, NO_BOOTSTRAP, Session, SessionConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Peer-to-peer terminal chat over plain TCP
#[derive(Parser, Debug)]
#[command(name = "peerline-node")]
#[command(about = "Peer-to-peer terminal chat over plain TCP")]
#[command(version)]
struct Args {
    /// Port to accept peers on (all interfaces)
    port: u16,

    /// Bootstrap peer as host:port, or "-" for none
    #[arg(default_value = NO_BOOTSTRAP)]
    peer: String,

    /// Display name announced to peers
    #[arg(default_value = "anonymous")]
    nickname: String,

    /// Seconds to wait when dialing the bootstrap peer
    #[arg(long, default_value = "10")]
    connect_timeout_secs: u64,

    /// Seconds a single write to a peer may take before it is dropped
    #[arg(long, default_value = "10")]
    write_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let bootstrap = Bootstrap::parse(&args.peer)?;
    let config = SessionConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        write_timeout: Duration::from_secs(args.write_timeout_secs),
        ..SessionConfig::new(args.nickname)
    };

    let (session, mut events) = Session::new(config)?;
    let mut console = Console::new(tokio::io::stdout());

    console.line(&format!("Starting peer at: {}", args.port)).await?;
    let listener = session.start_listening(args.port).await?;
    console.line(&format!("Listening at {}", listener.local_addr())).await?;

    if let Bootstrap::Peer(addr) = bootstrap {
        let session = session.clone();
        tokio::spawn(async move {
            if let Err(e) = session.connect_to_peer(&addr).await {
                tracing::error!("Bootstrap failed: {}", e);
            }
        });
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Command::Broadcast(text) => {
                        session.broadcast(&text).await;
                        console.line(&format!("[ You ]: {text}")).await?;
                    },
                    Command::SendTo { name, text } => {
                        let report = session.send_to(&name, &text).await;
                        console.line(&render_unicast(&name, &text, report)).await?;
                    },
                    Command::Peers => console.line(&render_peers(&session.peer_names())).await?,
                    Command::Invalid(reason) => console.line(&reason).await?,
                    Command::Empty => {},
                    Command::Quit => break,
                }
            },
            Some(event) = events.recv() => {
                if let Some(text) = render(&event) {
                    console.line(&text).await?;
                }
            },
        }
    }

    listener.stop();
    tracing::info!("Node shutting down");

    Ok(())
}
