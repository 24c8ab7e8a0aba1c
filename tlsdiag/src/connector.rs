#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Client connections: plain TCP or TCP followed by a TLS handshake.
//!
//! One call makes exactly one attempt; retrying is up to the caller.

use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::endpoint::Endpoint;
use crate::error::ConnectError;
use crate::logging::OpSpan;
use crate::session::{Session, TransportKind};
use crate::trust::TrustConfig;

/// Open a session to `endpoint`.
///
/// For [`TransportKind::Encrypted`] the TLS handshake is verified according to
/// `trust` and the host of `endpoint` is used as the server name (SNI and
/// certificate name check). `trust` is ignored for plain sessions.
///
/// # Errors
///
/// Returns an error if:
/// - The host is not usable as a TLS server name ([`ConnectError::InvalidServerName`])
/// - Resolution or the TCP connect fails ([`ConnectError::DialFailed`])
/// - Certificate verification or TLS negotiation fails ([`ConnectError::HandshakeFailed`])
///
/// # Example
/// ```no_run
/// use tlsdiag::{connect, resolve, Endpoint, TransportKind, TrustSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let trust = resolve(&TrustSource::System)?;
/// let endpoint: Endpoint = "example.com:443".parse()?;
/// let mut session = connect(&endpoint, TransportKind::Encrypted, &trust).await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(
    endpoint: &Endpoint,
    transport: TransportKind,
    trust: &TrustConfig,
) -> Result<Session, ConnectError> {
    let target = endpoint.to_string();

    // Validate the server name before touching the network
    let server_name = match transport {
        TransportKind::Plain => None,
        TransportKind::Encrypted => Some(
            ServerName::try_from(endpoint.host().to_owned())
                .map_err(|_| ConnectError::InvalidServerName { host: endpoint.host().to_owned() })?,
        ),
    };

    let span = OpSpan::connection(&target, transport_label(transport));
    let tcp = match TcpStream::connect((endpoint.host(), endpoint.port())).await {
        Ok(tcp) => tcp,
        Err(source) => {
            let err = ConnectError::DialFailed { endpoint: target, source };
            span.error(&err);
            return Err(err);
        }
    };
    let peer_addr = match tcp.peer_addr() {
        Ok(addr) => addr,
        Err(source) => {
            let err = ConnectError::DialFailed { endpoint: target, source };
            span.error(&err);
            return Err(err);
        }
    };
    span.complete();

    let Some(server_name) = server_name else {
        return Ok(Session::plain(tcp, peer_addr));
    };

    if trust.is_insecure() {
        tracing::warn!(endpoint = %target, "Certificate verification is disabled for this session");
    }

    let handshake = OpSpan::handshake(&peer_addr.to_string(), "client");
    let connector = TlsConnector::from(trust.client_config());
    match connector.connect(server_name, tcp).await {
        Ok(tls) => {
            handshake.complete();
            let session = Session::tls_client(tls, peer_addr);
            tracing::debug!(
                endpoint = %target,
                version = ?session.protocol_version(),
                certificates = session.peer_certificates().map_or(0, <[_]>::len),
                "TLS session established"
            );
            Ok(session)
        }
        Err(source) => {
            let err = ConnectError::HandshakeFailed { endpoint: target, source };
            handshake.error(&err);
            Err(err)
        }
    }
}

fn transport_label(transport: TransportKind) -> &'static str {
    match transport {
        TransportKind::Plain => "tcp",
        TransportKind::Encrypted => "tls",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::OperationPhase;
    use crate::trust::{TrustSource, resolve};

    #[tokio::test]
    async fn test_dial_failure_is_tagged() {
        // bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let trust = resolve(&TrustSource::SkipVerification).unwrap();
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
        let err = connect(&endpoint, TransportKind::Plain, &trust).await.unwrap_err();
        assert!(matches!(err, ConnectError::DialFailed { .. }));
        assert_eq!(err.phase(), OperationPhase::ConnectionSetup);
    }

    #[tokio::test]
    async fn test_invalid_server_name() {
        let trust = resolve(&TrustSource::SkipVerification).unwrap();
        let endpoint = Endpoint::new("bad host!", 443).unwrap();
        let err = connect(&endpoint, TransportKind::Encrypted, &trust).await.unwrap_err();
        assert!(matches!(err, ConnectError::InvalidServerName { .. }));
    }
}
