//! Shared fixtures: self-signed identities on disk and a running echo server.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use tempfile::TempDir;
use tlsdiag::{EchoServer, Endpoint, IdentitySource, ServerConfig, ServerError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A server certificate chain and key, written to a temporary directory
pub struct TestIdentity {
    /// Leaf first, then the issuing CA if there is one
    pub cert_pem: String,
    pub key_pem: String,
    pub ca_pem: Option<String>,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// What a client should trust: the CA, or the certificate itself if self-signed
    pub ca_path: PathBuf,
    _dir: TempDir,
}

impl TestIdentity {
    /// Valid for `127.0.0.1` (IP SAN) and `localhost`
    pub fn localhost() -> Self {
        Self::for_names(&["127.0.0.1", "localhost"])
    }

    /// Self-signed, with a subject CN no other identity in the process shares
    pub fn for_names(names: &[&str]) -> Self {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

        let names = names.iter().map(|n| (*n).to_string()).collect::<Vec<_>>();
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(names).unwrap();
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        params.distinguished_name.push(DnType::CommonName, format!("tlsdiag test identity {id}"));
        let cert = params.self_signed(&key).unwrap();
        Self::write(cert.pem(), key.serialize_pem(), None)
    }

    /// Leaf for `127.0.0.1` and `localhost`, issued by a fresh test CA
    pub fn ca_signed() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.distinguished_name.push(DnType::CommonName, "tlsdiag test CA");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let mut leaf_params =
            CertificateParams::new(vec!["127.0.0.1".to_string(), "localhost".to_string()])
                .unwrap();
        leaf_params.distinguished_name.push(DnType::CommonName, "localhost");
        let leaf = leaf_params.signed_by(&leaf_key, &ca_cert, &ca_key).unwrap();

        let chain = format!("{}{}", leaf.pem(), ca_cert.pem());
        Self::write(chain, leaf_key.serialize_pem(), Some(ca_cert.pem()))
    }

    fn write(cert_pem: String, key_pem: String, ca_pem: Option<String>) -> Self {
        let dir = TempDir::new().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, &cert_pem).unwrap();
        std::fs::write(&key_path, &key_pem).unwrap();
        let ca_path = dir.path().join("ca.pem");
        std::fs::write(&ca_path, ca_pem.as_deref().unwrap_or(&cert_pem)).unwrap();

        Self { cert_pem, key_pem, ca_pem, cert_path, key_path, ca_path, _dir: dir }
    }

    pub fn source(&self) -> IdentitySource {
        IdentitySource::Files { cert: self.cert_path.clone(), key: self.key_path.clone() }
    }
}

/// An echo server running on an ephemeral loopback port
pub struct RunningServer {
    pub addr: SocketAddr,
    pub identity: TestIdentity,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    pub async fn start(echo: bool) -> Self {
        Self::start_with(TestIdentity::localhost(), echo).await
    }

    pub async fn start_with(identity: TestIdentity, echo: bool) -> Self {
        let config =
            ServerConfig::new(Endpoint::ephemeral("127.0.0.1"), identity.source()).with_echo(echo);
        let server = EchoServer::bind(config).await.unwrap();
        let addr = server.local_addr();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_until(async {
            let _ = rx.await;
        }));

        Self { addr, identity, shutdown: Some(tx), handle }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port()).unwrap()
    }

    /// Stop accepting and wait for the accept loop to return
    pub async fn stop(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap()
    }
}
