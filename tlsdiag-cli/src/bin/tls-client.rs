//! Send lines from stdin over TCP or TLS and print each reply.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tlsdiag::interactive::{self, SessionEnd};
use tlsdiag::{
    Endpoint, TracingConfig, TransportKind, TrustSource, connect, init_tracing, resolve,
};
use tokio::io::BufReader;

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    /// Plain TCP
    Tcp,
    /// TLS over TCP
    Tls,
}

#[derive(Parser)]
#[command(name = "tls-client", version, about = "Interactive TCP/TLS line client")]
struct Cli {
    /// Server address (host:port)
    #[arg(long)]
    connect: Endpoint,

    /// Transport to use
    #[arg(long, value_enum, default_value_t = Transport::Tcp)]
    transport: Transport,

    /// Trust the CA certificates in this PEM file instead of the system roots
    #[arg(long)]
    certfile: Option<PathBuf>,

    /// Do not verify the server certificate
    #[arg(long)]
    noverify: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&TracingConfig::from_debug_flag(cli.debug))?;

    let (transport, source) = match cli.transport {
        // trust is not consulted for plain sessions
        Transport::Tcp => (TransportKind::Plain, TrustSource::SkipVerification),
        Transport::Tls => {
            (TransportKind::Encrypted, TrustSource::from_flags(cli.certfile, cli.noverify))
        }
    };
    let trust = resolve(&source)?;

    tracing::info!("connecting to {}", cli.connect);

    let mut session = connect(&cli.connect, transport, &trust)
        .await
        .with_context(|| format!("failed to connect to {}", cli.connect))?;
    tracing::info!("connected to {}", session.peer_addr());

    let input = BufReader::new(tokio::io::stdin());
    let mut output = std::io::stdout();
    let result = interactive::run(&mut session, input, &mut output).await;

    if let Err(e) = session.close().await {
        tracing::debug!(error = %e, "close failed");
    }

    match result.context("session failed")? {
        SessionEnd::InputClosed => tracing::debug!("input closed"),
        SessionEnd::PeerClosed => tracing::info!("server closed the connection"),
    }
    Ok(())
}
