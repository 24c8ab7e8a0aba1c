#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # tlsdiag
//!
//! Building blocks for small TLS diagnostic tools: a chain inspector, an
//! interactive line client and a concurrent echo server.
//!
//! ## Features
//!
//! - **One connect call** for plain TCP or TLS, with system, custom-CA or
//!   skip-verification trust
//! - **Chain inspection** of a live session or a PEM bundle on disk
//! - **Echo server** that handles every connection in its own task
//! - **Typed errors** carrying a phase and a stable error code
//!
//! ## Quick Start
//!
//! ```no_run
//! use tlsdiag::{Endpoint, TransportKind, TrustSource, chain, connect, resolve};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let trust = resolve(&TrustSource::System)?;
//! let endpoint: Endpoint = "example.com:443".parse()?;
//! let mut session = connect(&endpoint, TransportKind::Encrypted, &trust).await?;
//! if let Some(chain) = chain::from_session(&session) {
//!     print!("{chain}");
//! }
//! session.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Echo server
//!
//! ```no_run
//! use tlsdiag::{EchoServer, Endpoint, IdentitySource, ServerConfig};
//!
//! # async fn example() -> Result<(), tlsdiag::ServerError> {
//! let identity = IdentitySource::Files { cert: "cert.pem".into(), key: "key.pem".into() };
//! let config = ServerConfig::new(Endpoint::ephemeral("127.0.0.1"), identity);
//! let server = EchoServer::bind(config).await?;
//! println!("listening on {}", server.local_addr());
//! server.serve_until(async { tokio::signal::ctrl_c().await.ok(); }).await
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! TrustSource ──resolve──► TrustConfig ─┐
//!                                       ├──connect──► Session ──► chain::from_session
//! Endpoint + TransportKind ─────────────┘                  └────► interactive::run
//!
//! ServerConfig ──EchoServer::bind──► accept loop ──► Session per task ──► echo
//! ```
//!
//! ## Logging
//!
//! Everything is reported through `tracing`. Binaries install a subscriber
//! with [`logging::init_tracing`]; libraries and tests never do.

pub mod chain;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod interactive;
pub mod logging;
pub mod server;
pub mod session;
pub mod trust;

pub use chain::{CertificateChain, CertificateSummary};
pub use connector::connect;
pub use endpoint::Endpoint;
pub use error::{
    ConfigError, ConnectError, ErrorCode, OperationPhase, ParseError, ServerError,
    rustls_error_code,
};
pub use interactive::SessionEnd;
pub use logging::{OpSpan, TracingConfig, init_tracing};
pub use server::{EchoServer, IdentitySource, ServerConfig};
pub use session::{Session, TransportKind};
pub use trust::{TrustConfig, TrustMode, TrustSource, resolve};

/// Version of the tlsdiag crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
