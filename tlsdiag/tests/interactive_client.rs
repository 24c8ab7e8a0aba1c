//! Interactive loop against the echo server

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use common::RunningServer;
use tlsdiag::interactive::{self, SessionEnd};
use tlsdiag::{TransportKind, TrustSource, connect, resolve};

#[tokio::test]
async fn test_lines_round_trip_through_echo_server() {
    let server = RunningServer::start(true).await;
    let trust = resolve(&TrustSource::PemFile(server.identity.ca_path.clone())).unwrap();
    let mut session = connect(&server.endpoint(), TransportKind::Encrypted, &trust).await.unwrap();

    let input = b"hello\nworld\n";
    let mut output = Vec::new();
    let end = interactive::run(&mut session, &input[..], &mut output).await.unwrap();
    session.close().await.unwrap();

    assert_eq!(end, SessionEnd::InputClosed);
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "> client read: hello\n> client read: world\n> "
    );

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_empty_input_sends_nothing() {
    let server = RunningServer::start(true).await;
    let trust = resolve(&TrustSource::SkipVerification).unwrap();
    let mut session = connect(&server.endpoint(), TransportKind::Encrypted, &trust).await.unwrap();

    let mut output = Vec::new();
    let end = interactive::run(&mut session, &b""[..], &mut output).await.unwrap();
    session.close().await.unwrap();

    assert_eq!(end, SessionEnd::InputClosed);
    assert_eq!(output, b"> ");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_unterminated_last_line_ends_input_without_hanging() {
    let server = RunningServer::start(true).await;
    let trust = resolve(&TrustSource::SkipVerification).unwrap();
    let mut session = connect(&server.endpoint(), TransportKind::Encrypted, &trust).await.unwrap();

    let mut output = Vec::new();
    let end = tokio::time::timeout(
        Duration::from_secs(5),
        interactive::run(&mut session, &b"hello\nworld"[..], &mut output),
    )
    .await
    .unwrap()
    .unwrap();
    session.close().await.unwrap();

    assert_eq!(end, SessionEnd::InputClosed);
    assert_eq!(String::from_utf8(output).unwrap(), "> client read: hello\n> ");

    server.stop().await.unwrap();
}
