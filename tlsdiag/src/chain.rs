#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # Certificate Chain Inspection
//!
//! Turns certificates into human-readable summaries, either from a live TLS
//! [`Session`] (the chain captured during the handshake) or from a PEM bundle
//! on disk. Order is always preserved: leaf first for sessions, file order for
//! bundles.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::ParseError;
use crate::session::Session;

/// Read-only summary of one X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    issuer: String,
    subject: String,
    version: u32,
    not_after: DateTime<Utc>,
    dns_names: Vec<String>,
}

impl CertificateSummary {
    /// Summarize a DER-encoded certificate; the error is the decoder's
    /// description, wrapped into a [`ParseError`] or a log line by callers.
    pub(crate) fn from_der(der: &[u8]) -> Result<Self, String> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;

        let expiry = cert.validity().not_after;
        let not_after = DateTime::<Utc>::from_timestamp(expiry.timestamp(), 0)
            .ok_or_else(|| format!("notAfter {expiry} is out of range"))?;

        let dns_names = match cert.subject_alternative_name().map_err(|e| e.to_string())? {
            Some(san) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_string()),
                    _ => None,
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            issuer: cert.issuer().to_string(),
            subject: cert.subject().to_string(),
            // X.509 encodes v1 as 0
            version: cert.version().0.saturating_add(1),
            not_after,
            dns_names,
        })
    }

    /// Issuer distinguished name
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Subject distinguished name
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Certificate version (1, 2 or 3)
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// End of the validity period, in UTC
    #[must_use]
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// DNS names from the subject alternative name extension, in encoded order
    #[must_use]
    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Issuer: {}", self.issuer)?;
        writeln!(f, "Subject: {}", self.subject)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "NotAfter: {}", self.not_after.format("%Y-%m-%d %H:%M:%S UTC"))?;
        write!(f, "DNS names: [{}]", self.dns_names.join(" "))
    }
}

/// Ordered certificate summaries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<CertificateSummary>,
}

impl CertificateChain {
    /// Number of certificates
    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// True if the chain holds no certificate
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Certificate at `index`, leaf is 0
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CertificateSummary> {
        self.certificates.get(index)
    }

    /// Iterate in chain order
    pub fn iter(&self) -> std::slice::Iter<'_, CertificateSummary> {
        self.certificates.iter()
    }
}

impl<'a> IntoIterator for &'a CertificateChain {
    type Item = &'a CertificateSummary;
    type IntoIter = std::slice::Iter<'a, CertificateSummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for CertificateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, cert) in self.certificates.iter().enumerate() {
            writeln!(f, "{index}")?;
            writeln!(f, "{cert}")?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Summaries of the chain captured during a session's handshake.
///
/// Returns `None` for plain sessions. A certificate the peer sent that cannot
/// be decoded is logged and left out; this can only happen when verification
/// was skipped.
#[must_use]
pub fn from_session(session: &Session) -> Option<CertificateChain> {
    let certs = session.peer_certificates()?;
    let certificates = certs
        .iter()
        .enumerate()
        .filter_map(|(index, der)| match CertificateSummary::from_der(der.as_ref()) {
            Ok(summary) => Some(summary),
            Err(reason) => {
                tracing::warn!(index, %reason, "Peer sent an undecodable certificate");
                None
            }
        })
        .collect();
    Some(CertificateChain { certificates })
}

/// Summaries of every certificate in a PEM file, in file order.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read ([`ParseError::UnreadableFile`])
/// - A certificate block has broken framing or base64 ([`ParseError::MalformedPem`])
/// - A block is not a valid X.509 certificate ([`ParseError::MalformedCertificate`])
/// - The file holds no certificate block ([`ParseError::NoCertificates`])
///
/// # Example
/// ```no_run
/// let chain = tlsdiag::chain::from_file("bundle.pem")?;
/// for cert in &chain {
///     println!("{}", cert.subject());
/// }
/// # Ok::<(), tlsdiag::ParseError>(())
/// ```
pub fn from_file(path: impl AsRef<Path>) -> Result<CertificateChain, ParseError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|source| ParseError::UnreadableFile { path: path.to_path_buf(), source })?;
    from_pem(&bytes)
}

/// Summaries of every certificate in PEM text, in input order.
///
/// Sections of other types (keys, CRLs) are skipped. Decoding stops at the
/// first broken block; no partial chain is returned.
///
/// # Errors
///
/// Same as [`from_file`], minus the I/O case.
pub fn from_pem(pem: &[u8]) -> Result<CertificateChain, ParseError> {
    let mut certificates = Vec::new();

    for (block, item) in CertificateDer::pem_slice_iter(pem).enumerate() {
        let der = item.map_err(|e| ParseError::MalformedPem { block, reason: e.to_string() })?;
        let summary = CertificateSummary::from_der(der.as_ref())
            .map_err(|reason| ParseError::MalformedCertificate { block, reason })?;
        certificates.push(summary);
    }

    if certificates.is_empty() {
        return Err(ParseError::NoCertificates);
    }
    Ok(CertificateChain { certificates })
}
