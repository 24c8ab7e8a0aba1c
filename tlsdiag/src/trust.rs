#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # Trust Configuration
//!
//! Resolves a trust source into an immutable, shareable client configuration:
//! - **System**: root certificates from the operating system store
//! - **PEM bundle**: every certificate in a caller-supplied file
//! - **Skip verification**: accept any peer certificate (diagnostics only)
//!
//! The rustls `ClientConfig` is built once here and reused by every
//! connection attempt made with the resulting [`TrustConfig`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

use crate::error::ConfigError;

/// Where trust anchors come from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrustSource {
    /// Operating system root store
    #[default]
    System,
    /// A PEM bundle of trusted certificates
    PemFile(PathBuf),
    /// Disable certificate validation entirely
    SkipVerification,
}

impl TrustSource {
    /// Combine command-line style inputs; skip-verification wins over a CA file.
    #[must_use]
    pub fn from_flags(ca_file: Option<PathBuf>, skip_verification: bool) -> Self {
        match (ca_file, skip_verification) {
            (_, true) => TrustSource::SkipVerification,
            (Some(path), false) => TrustSource::PemFile(path),
            (None, false) => TrustSource::System,
        }
    }
}

/// Active verification mode of a [`TrustConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustMode {
    /// Verify against the system roots
    SystemTrust,
    /// Verify against the given anchors, in bundle order
    CustomCa(Vec<CertificateDer<'static>>),
    /// No verification
    SkipVerification,
}

/// Immutable verification configuration shared by all connection attempts
#[derive(Clone)]
pub struct TrustConfig {
    mode: TrustMode,
    client_config: Arc<ClientConfig>,
}

impl fmt::Debug for TrustConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustConfig").field("mode", &self.mode).finish_non_exhaustive()
    }
}

impl TrustConfig {
    /// The active mode
    #[must_use]
    pub fn mode(&self) -> &TrustMode {
        &self.mode
    }

    /// True when certificate validation is disabled
    #[must_use]
    pub fn is_insecure(&self) -> bool {
        self.mode == TrustMode::SkipVerification
    }

    /// The shared rustls client configuration
    #[must_use]
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }
}

/// Build a [`TrustConfig`] from a trust source.
///
/// # Errors
///
/// Returns an error if:
/// - The PEM bundle cannot be read ([`ConfigError::UnreadableFile`])
/// - The PEM bundle holds no usable certificate ([`ConfigError::InvalidPem`])
/// - The system store yields no root certificate ([`ConfigError::NoSystemRoots`])
///
/// # Example
/// ```no_run
/// use tlsdiag::trust::{resolve, TrustSource};
///
/// let trust = resolve(&TrustSource::PemFile("ca.pem".into()))?;
/// assert!(!trust.is_insecure());
/// # Ok::<(), tlsdiag::ConfigError>(())
/// ```
pub fn resolve(source: &TrustSource) -> Result<TrustConfig, ConfigError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let (mode, client_config) = match source {
        TrustSource::System => {
            let mut roots = RootCertStore::empty();
            load_system_root_certs(&mut roots)?;
            (TrustMode::SystemTrust, verifying_config(provider, roots)?)
        }
        TrustSource::PemFile(path) => {
            let anchors = load_trust_bundle(path)?;
            let mut roots = RootCertStore::empty();
            let (added, ignored) = roots.add_parsable_certificates(anchors.iter().cloned());
            if ignored > 0 {
                tracing::warn!(path = %path.display(), ignored, "Skipped unusable trust anchors");
            }
            if added == 0 {
                return Err(ConfigError::InvalidPem { path: path.clone() });
            }
            tracing::debug!(path = %path.display(), added, "Loaded trust anchors");
            (TrustMode::CustomCa(anchors), verifying_config(provider, roots)?)
        }
        TrustSource::SkipVerification => {
            let verifier = Arc::new(SkipServerVerification::new(&provider));
            let config = ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()?
                .dangerous()
                .with_custom_certificate_verifier(verifier)
                .with_no_client_auth();
            (TrustMode::SkipVerification, config)
        }
    };

    Ok(TrustConfig { mode, client_config: Arc::new(client_config) })
}

fn verifying_config(
    provider: Arc<CryptoProvider>,
    roots: RootCertStore,
) -> Result<ClientConfig, ConfigError> {
    let builder =
        ClientConfig::builder_with_provider(provider).with_safe_default_protocol_versions()?;
    Ok(builder.with_root_certificates(roots).with_no_client_auth())
}

/// Read every certificate from a PEM trust bundle.
///
/// Blocks that fail to decode are skipped; the bundle is rejected only when
/// nothing usable remains.
fn load_trust_bundle(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let bytes = std::fs::read(path)
        .map_err(|source| ConfigError::UnreadableFile { path: path.to_path_buf(), source })?;

    let certs: Vec<_> = CertificateDer::pem_slice_iter(&bytes).filter_map(Result::ok).collect();
    if certs.is_empty() {
        return Err(ConfigError::InvalidPem { path: path.to_path_buf() });
    }
    Ok(certs)
}

/// Load system root certificates into the provided store
fn load_system_root_certs(root_store: &mut RootCertStore) -> Result<(), ConfigError> {
    let cert_result = rustls_native_certs::load_native_certs();

    // Partial failures are fine as long as something loaded
    for error in &cert_result.errors {
        tracing::warn!("Error loading some native root certificates: {}", error);
    }

    let (loaded, _) = root_store.add_parsable_certificates(cert_result.certs);
    tracing::debug!("Loaded {} root certificates from system store", loaded);

    if root_store.is_empty() {
        tracing::error!("No root certificates could be loaded from the system");
        return Err(ConfigError::NoSystemRoots);
    }

    Ok(())
}

/// Accepts any server certificate.
///
/// Handshake signatures are still checked against the presented leaf key, so
/// the session is encrypted to whoever holds that key; only the chain of
/// trust is ignored.
#[derive(Debug)]
struct SkipServerVerification {
    algorithms: WebPkiSupportedAlgorithms,
}

impl SkipServerVerification {
    fn new(provider: &CryptoProvider) -> Self {
        Self { algorithms: provider.signature_verification_algorithms }
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
