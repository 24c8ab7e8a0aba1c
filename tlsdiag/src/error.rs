#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # Error Taxonomy for TLS Diagnostics
//!
//! Every fallible operation in this crate returns one of four typed errors:
//! - [`ConfigError`]: trust-source and endpoint problems
//! - [`ConnectError`]: dial or handshake problems, tagged with the failing phase
//! - [`ParseError`]: PEM / certificate decoding problems, tagged with the block index
//! - [`ServerError`]: identity loading and listener problems
//!
//! Each error maps onto a stable [`ErrorCode`] so that callers (and logs) can
//! classify failures without matching on message text.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Phase of a connection attempt in which a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    /// Validating inputs before any I/O
    Initialization,
    /// Name resolution and TCP connect
    ConnectionSetup,
    /// TLS handshake, including certificate verification
    Handshake,
    /// Post-handshake data transfer
    DataTransfer,
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationPhase::Initialization => write!(f, "initialization"),
            OperationPhase::ConnectionSetup => write!(f, "dial"),
            OperationPhase::Handshake => write!(f, "handshake"),
            OperationPhase::DataTransfer => write!(f, "data transfer"),
        }
    }
}

/// Standard error codes for easy identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Connection errors (1000-1099)
    /// Connection was actively refused by the remote host.
    ConnectionRefused = 1001,
    /// Connection attempt timed out.
    ConnectionTimeout = 1002,
    /// Connection was reset by the remote host.
    ConnectionReset = 1003,
    /// DNS resolution failed for the hostname.
    DnsResolutionFailed = 1004,

    // Handshake errors (2000-2099)
    /// TLS handshake failed.
    HandshakeFailed = 2001,
    /// Protocol version mismatch between client and server.
    ProtocolVersionMismatch = 2002,
    /// Invalid handshake message received.
    InvalidHandshakeMessage = 2004,
    /// Handshake timed out.
    HandshakeTimeout = 2006,

    // Certificate errors (3000-3099)
    /// Failed to parse certificate.
    CertificateParseError = 3001,
    /// Certificate has expired.
    CertificateExpired = 3002,
    /// Certificate is not yet valid.
    CertificateNotYetValid = 3003,
    /// Certificate is invalid.
    CertificateInvalid = 3005,
    /// Certificate was issued by an unknown authority.
    CertificateUnknownIssuer = 3006,
    /// Certificate is not valid for the requested name.
    CertificateNotValidForName = 3009,
    /// Certificate signature is invalid.
    CertificateSignatureInvalid = 3015,
    /// Invalid PEM framing.
    PemParseError = 3020,

    // IO errors (6000-6099)
    /// General I/O error.
    IoError = 6001,
    /// A file could not be read.
    FileUnreadable = 6005,

    // Configuration errors (7000-7099)
    /// Invalid configuration.
    InvalidConfig = 7001,
    /// Required certificate is missing.
    MissingCertificate = 7002,
    /// Required private key is missing or unusable.
    MissingPrivateKey = 7003,
    /// No trust anchors are available.
    NoTrustAnchors = 7006,

    // Listener errors (8000-8099)
    /// Listener could not be bound.
    BindFailed = 8004,
    /// Listener failed while accepting.
    AcceptFailed = 8005,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Connection errors
            ErrorCode::ConnectionRefused => write!(f, "CONNECTION_REFUSED"),
            ErrorCode::ConnectionTimeout => write!(f, "CONNECTION_TIMEOUT"),
            ErrorCode::ConnectionReset => write!(f, "CONNECTION_RESET"),
            ErrorCode::DnsResolutionFailed => write!(f, "DNS_RESOLUTION_FAILED"),

            // Handshake errors
            ErrorCode::HandshakeFailed => write!(f, "HANDSHAKE_FAILED"),
            ErrorCode::ProtocolVersionMismatch => write!(f, "PROTOCOL_VERSION_MISMATCH"),
            ErrorCode::InvalidHandshakeMessage => write!(f, "INVALID_HANDSHAKE_MESSAGE"),
            ErrorCode::HandshakeTimeout => write!(f, "HANDSHAKE_TIMEOUT"),

            // Certificate errors
            ErrorCode::CertificateParseError => write!(f, "CERTIFICATE_PARSE_ERROR"),
            ErrorCode::CertificateExpired => write!(f, "CERTIFICATE_EXPIRED"),
            ErrorCode::CertificateNotYetValid => write!(f, "CERTIFICATE_NOT_YET_VALID"),
            ErrorCode::CertificateInvalid => write!(f, "CERTIFICATE_INVALID"),
            ErrorCode::CertificateUnknownIssuer => write!(f, "CERTIFICATE_UNKNOWN_ISSUER"),
            ErrorCode::CertificateNotValidForName => write!(f, "CERTIFICATE_NOT_VALID_FOR_NAME"),
            ErrorCode::CertificateSignatureInvalid => write!(f, "CERTIFICATE_SIGNATURE_INVALID"),
            ErrorCode::PemParseError => write!(f, "PEM_PARSE_ERROR"),

            // IO errors
            ErrorCode::IoError => write!(f, "IO_ERROR"),
            ErrorCode::FileUnreadable => write!(f, "FILE_UNREADABLE"),

            // Configuration errors
            ErrorCode::InvalidConfig => write!(f, "INVALID_CONFIG"),
            ErrorCode::MissingCertificate => write!(f, "MISSING_CERTIFICATE"),
            ErrorCode::MissingPrivateKey => write!(f, "MISSING_PRIVATE_KEY"),
            ErrorCode::NoTrustAnchors => write!(f, "NO_TRUST_ANCHORS"),

            // Listener errors
            ErrorCode::BindFailed => write!(f, "BIND_FAILED"),
            ErrorCode::AcceptFailed => write!(f, "ACCEPT_FAILED"),
        }
    }
}

/// Problems with the trust source or other caller-supplied configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The trust bundle could not be opened or read
    #[error("cannot read '{}': {source}", path.display())]
    UnreadableFile {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The trust bundle holds no parseable certificate
    #[error("no certificate could be parsed from '{}'", path.display())]
    InvalidPem {
        /// Path of the file
        path: PathBuf,
    },

    /// The operating system store yielded no usable root certificate
    #[error("no root certificates available from the system store")]
    NoSystemRoots,

    /// The TLS provider rejected the client configuration
    #[error("TLS provider rejected the configuration: {0}")]
    Provider(#[from] rustls::Error),

    /// An endpoint string or port is not acceptable
    #[error("invalid endpoint '{input}': {reason}")]
    InvalidEndpoint {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: &'static str,
    },
}

impl ConfigError {
    /// Error code for this failure
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::UnreadableFile { .. } => ErrorCode::FileUnreadable,
            ConfigError::InvalidPem { .. } => ErrorCode::PemParseError,
            ConfigError::NoSystemRoots => ErrorCode::NoTrustAnchors,
            ConfigError::Provider(_) | ConfigError::InvalidEndpoint { .. } => {
                ErrorCode::InvalidConfig
            }
        }
    }
}

/// Failure to establish a session, tagged with the phase that failed
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The host name cannot be used as a TLS server name
    #[error("'{host}' is not a valid TLS server name")]
    InvalidServerName {
        /// The offending host
        host: String,
    },

    /// Transport-level failure: resolution, refusal, timeout
    #[error("dial {endpoint} failed: {source}")]
    DialFailed {
        /// Target as `host:port`
        endpoint: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Certificate verification or protocol negotiation failure
    #[error("TLS handshake with {endpoint} failed: {source}")]
    HandshakeFailed {
        /// Target as `host:port`
        endpoint: String,
        /// Underlying error; wraps a `rustls::Error` when TLS rejected the peer
        #[source]
        source: io::Error,
    },
}

impl ConnectError {
    /// The phase in which the attempt failed
    #[must_use]
    pub fn phase(&self) -> OperationPhase {
        match self {
            ConnectError::InvalidServerName { .. } => OperationPhase::Initialization,
            ConnectError::DialFailed { .. } => OperationPhase::ConnectionSetup,
            ConnectError::HandshakeFailed { .. } => OperationPhase::Handshake,
        }
    }

    /// Error code for this failure
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectError::InvalidServerName { .. } => ErrorCode::InvalidConfig,
            ConnectError::DialFailed { source, .. } => dial_error_code(source),
            ConnectError::HandshakeFailed { source, .. } => handshake_error_code(source),
        }
    }

    /// The rustls error behind a handshake failure, if TLS produced one
    #[must_use]
    pub fn tls_error(&self) -> Option<&rustls::Error> {
        match self {
            ConnectError::HandshakeFailed { source, .. } => {
                source.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>())
            }
            _ => None,
        }
    }
}

fn dial_error_code(err: &io::Error) -> ErrorCode {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ErrorCode::ConnectionRefused,
        io::ErrorKind::TimedOut => ErrorCode::ConnectionTimeout,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            ErrorCode::ConnectionReset
        }
        // std reports resolver failures as uncategorized errors
        io::ErrorKind::NotFound | io::ErrorKind::Other => ErrorCode::DnsResolutionFailed,
        _ => ErrorCode::IoError,
    }
}

fn handshake_error_code(err: &io::Error) -> ErrorCode {
    if err.kind() == io::ErrorKind::TimedOut {
        return ErrorCode::HandshakeTimeout;
    }
    match err.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()) {
        Some(tls) => rustls_error_code(tls),
        None => ErrorCode::HandshakeFailed,
    }
}

/// Classify a rustls error
#[must_use]
pub fn rustls_error_code(err: &rustls::Error) -> ErrorCode {
    use rustls::CertificateError;

    match err {
        rustls::Error::InvalidMessage(_) => ErrorCode::InvalidHandshakeMessage,
        rustls::Error::PeerIncompatible(_) => ErrorCode::ProtocolVersionMismatch,
        rustls::Error::NoCertificatesPresented => ErrorCode::MissingCertificate,
        rustls::Error::InvalidCertificate(cert_err) => match cert_err {
            CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
                ErrorCode::CertificateExpired
            }
            CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
                ErrorCode::CertificateNotYetValid
            }
            CertificateError::UnknownIssuer => ErrorCode::CertificateUnknownIssuer,
            CertificateError::NotValidForName
            | CertificateError::NotValidForNameContext { .. } => {
                ErrorCode::CertificateNotValidForName
            }
            CertificateError::BadSignature => ErrorCode::CertificateSignatureInvalid,
            CertificateError::BadEncoding => ErrorCode::CertificateParseError,
            _ => ErrorCode::CertificateInvalid,
        },
        _ => ErrorCode::HandshakeFailed,
    }
}

/// Failure to decode a PEM certificate bundle
#[derive(Debug, Error)]
pub enum ParseError {
    /// The bundle could not be opened or read
    #[error("cannot read '{}': {source}", path.display())]
    UnreadableFile {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// PEM framing or base64 of a block is broken
    #[error("PEM block {block} is malformed: {reason}")]
    MalformedPem {
        /// Zero-based index of the certificate block
        block: usize,
        /// Decoder message
        reason: String,
    },

    /// A block decoded but is not a valid X.509 certificate
    #[error("certificate {block} is malformed: {reason}")]
    MalformedCertificate {
        /// Zero-based index of the certificate block
        block: usize,
        /// Decoder message
        reason: String,
    },

    /// The input holds no certificate block at all
    #[error("no certificates found")]
    NoCertificates,
}

impl ParseError {
    /// Error code for this failure
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ParseError::UnreadableFile { .. } => ErrorCode::FileUnreadable,
            ParseError::MalformedPem { .. } => ErrorCode::PemParseError,
            ParseError::MalformedCertificate { .. } => ErrorCode::CertificateParseError,
            ParseError::NoCertificates => ErrorCode::MissingCertificate,
        }
    }

    /// Index of the failing block, when one block is to blame
    #[must_use]
    pub fn block(&self) -> Option<usize> {
        match self {
            ParseError::MalformedPem { block, .. }
            | ParseError::MalformedCertificate { block, .. } => Some(*block),
            _ => None,
        }
    }
}

/// Fatal echo server failures
#[derive(Debug, Error)]
pub enum ServerError {
    /// The certificate/key pair cannot be loaded or does not match
    #[error("invalid server identity: {message}")]
    InvalidIdentity {
        /// What went wrong
        message: String,
    },

    /// The listen endpoint could not be bound
    #[error("cannot listen on {endpoint}: {source}")]
    Bind {
        /// Listen endpoint
        endpoint: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The listener failed in a way that leaves it unusable
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
}

impl ServerError {
    /// Error code for this failure
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ServerError::InvalidIdentity { .. } => ErrorCode::MissingPrivateKey,
            ServerError::Bind { .. } => ErrorCode::BindFailed,
            ServerError::Accept(_) => ErrorCode::AcceptFailed,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::ConnectionRefused.to_string(), "CONNECTION_REFUSED");
        assert_eq!(ErrorCode::HandshakeFailed.to_string(), "HANDSHAKE_FAILED");
        assert_eq!(ErrorCode::PemParseError.to_string(), "PEM_PARSE_ERROR");
    }

    #[test]
    fn test_dial_refused_code() {
        let err = ConnectError::DialFailed {
            endpoint: "127.0.0.1:1".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(err.phase(), OperationPhase::ConnectionSetup);
        assert_eq!(err.code(), ErrorCode::ConnectionRefused);
        assert!(err.tls_error().is_none());
    }

    #[test]
    fn test_handshake_unknown_issuer_code() {
        let tls = rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer);
        let err = ConnectError::HandshakeFailed {
            endpoint: "localhost:4040".to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, tls),
        };
        assert_eq!(err.phase(), OperationPhase::Handshake);
        assert_eq!(err.code(), ErrorCode::CertificateUnknownIssuer);
        assert!(err.tls_error().is_some());
    }

    #[test]
    fn test_handshake_timeout_code() {
        let err = ConnectError::HandshakeFailed {
            endpoint: "localhost:4040".to_string(),
            source: io::Error::new(io::ErrorKind::TimedOut, "stalled"),
        };
        assert_eq!(err.code(), ErrorCode::HandshakeTimeout);
    }

    #[test]
    fn test_parse_error_block() {
        let err = ParseError::MalformedCertificate { block: 2, reason: "bad".to_string() };
        assert_eq!(err.block(), Some(2));
        assert_eq!(err.code(), ErrorCode::CertificateParseError);
        assert!(ParseError::NoCertificates.block().is_none());
    }

    #[test]
    fn test_config_error_message_names_file() {
        let err = ConfigError::InvalidPem { path: PathBuf::from("/tmp/ca.pem") };
        assert!(err.to_string().contains("/tmp/ca.pem"));
        assert_eq!(err.code(), ErrorCode::PemParseError);
    }
}
