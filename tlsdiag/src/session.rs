#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! A bidirectional byte stream over plain TCP or TLS.
//!
//! [`Session`] implements `AsyncRead + AsyncWrite` for every transport kind, so
//! code after connection setup does not care whether the bytes are encrypted.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use rustls_pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

/// Which transport a session runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Raw TCP
    Plain,
    /// TLS over TCP
    Encrypted,
}

enum Stream {
    Plain(TcpStream),
    TlsClient(Box<tokio_rustls::client::TlsStream<TcpStream>>),
    TlsServer(Box<tokio_rustls::server::TlsStream<TcpStream>>),
}

/// An open connection owned by exactly one task
pub struct Session {
    stream: Stream,
    peer_addr: SocketAddr,
    peer_certificates: Option<Vec<CertificateDer<'static>>>,
    closed: bool,
}

impl Session {
    pub(crate) fn plain(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self { stream: Stream::Plain(stream), peer_addr, peer_certificates: None, closed: false }
    }

    pub(crate) fn tls_client(
        stream: tokio_rustls::client::TlsStream<TcpStream>,
        peer_addr: SocketAddr,
    ) -> Self {
        let (_, conn) = stream.get_ref();
        let peer_certificates = Some(owned_chain(conn.peer_certificates()));
        Self {
            stream: Stream::TlsClient(Box::new(stream)),
            peer_addr,
            peer_certificates,
            closed: false,
        }
    }

    pub(crate) fn tls_server(
        stream: tokio_rustls::server::TlsStream<TcpStream>,
        peer_addr: SocketAddr,
    ) -> Self {
        let (_, conn) = stream.get_ref();
        let peer_certificates = Some(owned_chain(conn.peer_certificates()));
        Self {
            stream: Stream::TlsServer(Box::new(stream)),
            peer_addr,
            peer_certificates,
            closed: false,
        }
    }

    /// Transport this session runs over
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        match self.stream {
            Stream::Plain(_) => TransportKind::Plain,
            Stream::TlsClient(_) | Stream::TlsServer(_) => TransportKind::Encrypted,
        }
    }

    /// Remote address
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Certificates the peer presented during the handshake, leaf first.
    ///
    /// `None` for plain sessions; `Some(&[])` if the peer presented none.
    #[must_use]
    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.peer_certificates.as_deref()
    }

    /// Negotiated TLS protocol version, if encrypted
    #[must_use]
    pub fn protocol_version(&self) -> Option<rustls::ProtocolVersion> {
        match &self.stream {
            Stream::Plain(_) => None,
            Stream::TlsClient(tls) => tls.get_ref().1.protocol_version(),
            Stream::TlsServer(tls) => tls.get_ref().1.protocol_version(),
        }
    }

    /// True once [`close`](Self::close) has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Shut the connection down. Only the first call does anything.
    ///
    /// For TLS this sends `close_notify` before shutting the TCP write half.
    /// Dropping an unclosed session still releases the socket.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the first shutdown attempt. The session counts
    /// as closed either way.
    pub async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match &mut self.stream {
            Stream::Plain(tcp) => tcp.shutdown().await,
            Stream::TlsClient(tls) => tls.shutdown().await,
            Stream::TlsServer(tls) => tls.shutdown().await,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport())
            .field("peer_addr", &self.peer_addr)
            .field("peer_certificates", &self.peer_certificates.as_ref().map(Vec::len))
            .field("closed", &self.closed)
            .finish()
    }
}

fn owned_chain(certs: Option<&[CertificateDer<'_>]>) -> Vec<CertificateDer<'static>> {
    certs.map(|c| c.iter().map(|cert| cert.clone().into_owned()).collect()).unwrap_or_default()
}

impl AsyncRead for Session {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().stream {
            Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Stream::TlsClient(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            Stream::TlsServer(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Session {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().stream {
            Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Stream::TlsClient(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            Stream::TlsServer(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().stream {
            Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Stream::TlsClient(s) => Pin::new(s.as_mut()).poll_flush(cx),
            Stream::TlsServer(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().stream {
            Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Stream::TlsClient(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            Stream::TlsServer(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
