#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # TLS Echo Server
//!
//! Accepts TLS connections and, per connection, reads newline-delimited chunks
//! and optionally writes each chunk straight back.
//!
//! ## Task model
//!
//! ```text
//! accept loop (one task)
//!   ├── accept ──► spawn handler ──► handshake ──► read/echo ... ──► close
//!   ├── accept ──► spawn handler ──► ...
//!   └── shutdown signal ──► stop accepting (running handlers finish on their own)
//! ```
//!
//! Handlers share nothing but the read-only settings and TLS acceptor. A
//! handler's failure is logged and ends that connection only.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::endpoint::Endpoint;
use crate::error::ServerError;
use crate::logging::OpSpan;
use crate::session::Session;

/// Default time a client gets to finish the TLS handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default upper bound for one chunk; longer lines are split
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Where the server certificate chain and private key come from
#[derive(Debug, Clone)]
pub enum IdentitySource {
    /// PEM files on disk
    Files {
        /// Certificate chain, leaf first
        cert: PathBuf,
        /// Private key (PKCS#1, PKCS#8 or SEC1)
        key: PathBuf,
    },
    /// PEM text already in memory
    Pem {
        /// Certificate chain, leaf first
        cert: Vec<u8>,
        /// Private key
        key: Vec<u8>,
    },
}

/// Immutable echo server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen endpoint
    pub bind: Endpoint,
    /// Server certificate and key
    pub identity: IdentitySource,
    /// Write each received chunk back to its sender
    pub echo: bool,
    /// Time allowed for a client's TLS handshake
    pub handshake_timeout: Duration,
    /// Largest chunk read in one go
    pub max_line_len: usize,
}

impl ServerConfig {
    /// Configuration with echo enabled and default limits
    #[must_use]
    pub fn new(bind: Endpoint, identity: IdentitySource) -> Self {
        Self {
            bind,
            identity,
            echo: true,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Enable or disable echoing
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Set the handshake timeout
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the chunk size limit (at least 1)
    #[must_use]
    pub fn with_max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len.max(1);
        self
    }
}

/// What each connection handler needs
#[derive(Debug)]
struct HandlerSettings {
    echo: bool,
    handshake_timeout: Duration,
    max_line_len: usize,
}

/// A bound echo server, ready to accept
pub struct EchoServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    settings: Arc<HandlerSettings>,
    local_addr: SocketAddr,
}

impl std::fmt::Debug for EchoServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoServer")
            .field("local_addr", &self.local_addr)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl EchoServer {
    /// Load the identity and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The certificate or key cannot be read or parsed, or they do not match
    ///   ([`ServerError::InvalidIdentity`])
    /// - The endpoint cannot be bound ([`ServerError::Bind`])
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let (certs, key) = load_identity(&config.identity)?;
        let acceptor = create_server_acceptor(certs, key)?;

        let endpoint = config.bind.to_string();
        let listener = TcpListener::bind((config.bind.host(), config.bind.port()))
            .await
            .map_err(|source| ServerError::Bind { endpoint: endpoint.clone(), source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { endpoint: endpoint.clone(), source })?;

        tracing::info!("listening on {}", local_addr);

        Ok(Self {
            listener,
            acceptor,
            settings: Arc::new(HandlerSettings {
                echo: config.echo,
                handshake_timeout: config.handshake_timeout,
                max_line_len: config.max_line_len.max(1),
            }),
            local_addr,
        })
    }

    /// Address the listener is bound to
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] when the listener becomes unusable.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_until(std::future::pending::<()>()).await
    }

    /// Accept connections until `shutdown` resolves or the listener fails.
    ///
    /// On shutdown the listener is closed; handlers already running are left
    /// to finish on their own.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] when the listener becomes unusable.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            let (tcp, peer) = tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting on {}", self.local_addr);
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) if is_per_connection_error(&e) => {
                        tracing::warn!(error = %e, "dropped a connection before it was accepted");
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        return Err(ServerError::Accept(e));
                    }
                },
            };

            tracing::info!("accepted connection from {}", peer);
            let acceptor = self.acceptor.clone();
            let settings = Arc::clone(&self.settings);
            tokio::spawn(
                handle_connection(tcp, peer, acceptor, settings)
                    .instrument(tracing::info_span!("connection", peer = %peer)),
            );
        }
    }
}

fn is_per_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::Interrupted
    )
}

async fn handle_connection(
    tcp: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    settings: Arc<HandlerSettings>,
) {
    if let Err(e) = tcp.set_nodelay(true) {
        tracing::debug!(error = %e, "could not disable Nagle");
    }

    let handshake = OpSpan::handshake(&peer.to_string(), "server");
    let tls = match tokio::time::timeout(settings.handshake_timeout, acceptor.accept(tcp)).await {
        Ok(Ok(tls)) => {
            handshake.complete();
            tls
        }
        Ok(Err(e)) => {
            handshake.error(&e);
            return;
        }
        Err(elapsed) => {
            handshake.error(&elapsed);
            return;
        }
    };

    let mut session = Session::tls_server(tls, peer);
    match echo_loop(&mut session, &settings).await {
        Ok(chunks) => tracing::info!(chunks, "peer closed the connection"),
        Err(e) => tracing::error!(error = %e, "read error"),
    }
    if let Err(e) = session.close().await {
        tracing::debug!(error = %e, "close failed");
    }
    tracing::info!("closing connection from {}", peer);
}

/// Read chunks until EOF, echoing each one if enabled. Returns the chunk count.
async fn echo_loop(session: &mut Session, settings: &HandlerSettings) -> io::Result<u64> {
    let mut reader = BufReader::new(session);
    let mut chunk = Vec::new();
    let mut chunks = 0u64;
    let limit = u64::try_from(settings.max_line_len).unwrap_or(u64::MAX);

    loop {
        chunk.clear();
        let n = (&mut reader).take(limit).read_until(b'\n', &mut chunk).await?;
        if n == 0 {
            return Ok(chunks);
        }
        chunks = chunks.saturating_add(1);
        tracing::debug!(bytes = n, "received: {}", String::from_utf8_lossy(&chunk).trim_end());

        if settings.echo {
            let stream = reader.get_mut();
            stream.write_all(&chunk).await?;
            stream.flush().await?;
        }
    }
}

/// Load and validate the certificate chain and private key
fn load_identity(
    source: &IdentitySource,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ServerError> {
    let (cert_pem, key_pem) = match source {
        IdentitySource::Files { cert, key } => {
            let cert_pem = std::fs::read(cert).map_err(|e| ServerError::InvalidIdentity {
                message: format!("Failed to open certificate file '{}': {}", cert.display(), e),
            })?;
            let key_pem = std::fs::read(key).map_err(|e| ServerError::InvalidIdentity {
                message: format!("Failed to open private key file '{}': {}", key.display(), e),
            })?;
            (cert_pem, key_pem)
        }
        IdentitySource::Pem { cert, key } => (cert.clone(), key.clone()),
    };

    let certs = CertificateDer::pem_slice_iter(&cert_pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::InvalidIdentity {
            message: format!("Failed to parse certificate: {}", e),
        })?;
    if certs.is_empty() {
        return Err(ServerError::InvalidIdentity {
            message: "No valid certificates found".to_string(),
        });
    }

    let key = PrivateKeyDer::from_pem_slice(&key_pem).map_err(|e| ServerError::InvalidIdentity {
        message: format!("Failed to parse private key: {}", e),
    })?;

    Ok((certs, key))
}

/// Build the acceptor; rustls rejects a key that does not match the leaf
fn create_server_acceptor(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<TlsAcceptor, ServerError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .and_then(|builder| builder.with_no_client_auth().with_single_cert(certs, key))
        .map_err(|e| ServerError::InvalidIdentity {
            message: format!("Certificate and key rejected: {}", e),
        })?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
