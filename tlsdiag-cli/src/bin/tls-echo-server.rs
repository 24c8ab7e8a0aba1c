//! TLS echo server. Each connection is served in its own task; Ctrl-C stops
//! accepting new connections.

use std::path::PathBuf;

use clap::Parser;
use tlsdiag::{EchoServer, Endpoint, IdentitySource, ServerConfig, TracingConfig, init_tracing};

#[derive(Parser)]
#[command(name = "tls-echo-server", version, about = "Concurrent TLS echo server")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    listen: String,

    /// Port to listen on
    #[arg(long)]
    port: u16,

    /// Certificate chain (PEM)
    #[arg(long, default_value = "cert.pem")]
    cert: PathBuf,

    /// Private key (PEM)
    #[arg(long, default_value = "key.pem")]
    key: PathBuf,

    /// Read lines but do not echo them back
    #[arg(long)]
    noecho: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // connections are spread over worker threads; show which one logged
    let tracing_config = if cli.debug {
        TracingConfig::debug().with_thread_ids()
    } else {
        TracingConfig::default()
    };
    init_tracing(&tracing_config)?;

    let bind = Endpoint::new(cli.listen, cli.port)?;
    let identity = IdentitySource::Files { cert: cli.cert, key: cli.key };
    let config = ServerConfig::new(bind, identity).with_echo(!cli.noecho);

    let server = EchoServer::bind(config).await?;
    server
        .serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
