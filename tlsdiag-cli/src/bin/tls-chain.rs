//! Print the certificate chain a TLS server presents, or the certificates in
//! a PEM file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tlsdiag::{
    Endpoint, TracingConfig, TransportKind, TrustSource, chain, connect, init_tracing, resolve,
};

#[derive(Parser)]
#[command(name = "tls-chain", version, about = "Show a TLS certificate chain")]
struct Cli {
    /// Server address (host:port)
    #[arg(long, default_value = "localhost:4040")]
    addr: Endpoint,

    /// Do not verify the server certificate
    #[arg(long)]
    noverify: bool,

    /// Trust the CA certificates in this PEM file instead of the system roots
    #[arg(long)]
    cafile: Option<PathBuf>,

    /// Read certificates from this PEM file instead of connecting
    #[arg(long)]
    file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&TracingConfig::from_debug_flag(cli.debug))?;

    if let Some(path) = &cli.file {
        let chain = chain::from_file(path)
            .with_context(|| format!("failed to read certificates from {}", path.display()))?;
        print!("{chain}");
        return Ok(());
    }

    let trust = resolve(&TrustSource::from_flags(cli.cafile, cli.noverify))?;
    let mut session = connect(&cli.addr, TransportKind::Encrypted, &trust)
        .await
        .with_context(|| format!("failed to connect to {}", cli.addr))?;

    if let Some(chain) = chain::from_session(&session) {
        print!("{chain}");
    }

    if let Err(e) = session.close().await {
        tracing::debug!(error = %e, "close failed");
    }
    Ok(())
}
