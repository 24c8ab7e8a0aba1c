#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Line-oriented request/response driver for a [`Session`](crate::Session).
//!
//! Each input line is sent as-is (newline included), then one reply read is
//! printed. A final line without a newline is not sent: the peer reads by
//! line and would never answer it. The loop is generic over its streams so it runs against stdin and
//! stdout in the binary and against in-memory buffers in tests.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest reply read after each line
pub const REPLY_BUFFER_LEN: usize = 4096;

/// Why [`run`] stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The input source hit EOF
    InputClosed,
    /// The peer closed its side
    PeerClosed,
}

/// Drive `session` from `input`, printing prompts and replies to `output`.
///
/// The session is left open; closing it is up to the caller.
///
/// # Errors
///
/// Returns any I/O error from the session, the input, or the output.
pub async fn run<S, I, W>(session: &mut S, mut input: I, output: &mut W) -> io::Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    W: Write,
{
    let mut line = String::new();
    let mut reply = vec![0u8; REPLY_BUFFER_LEN];

    loop {
        write!(output, "> ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(SessionEnd::InputClosed);
        }
        if !line.ends_with('\n') {
            tracing::debug!(bytes = line.len(), "input ended mid-line, not sent");
            return Ok(SessionEnd::InputClosed);
        }

        session.write_all(line.as_bytes()).await?;
        session.flush().await?;
        tracing::debug!(bytes = line.len(), "client wrote");

        let n = session.read(&mut reply).await?;
        if n == 0 {
            tracing::info!("peer closed the connection");
            return Ok(SessionEnd::PeerClosed);
        }
        let text = String::from_utf8_lossy(reply.get(..n).unwrap_or_default());
        write!(output, "client read: {text}")?;
        if !text.ends_with('\n') {
            writeln!(output)?;
        }
        output.flush()?;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_input_eof_ends_loop() {
        let (mut client, mut peer) = tokio::io::duplex(1024);
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = peer.read(&mut buf).await.unwrap();
            peer.write_all(&buf[..n]).await.unwrap();
        });

        let mut out = Vec::new();
        let end = run(&mut client, &b"ping\n"[..], &mut out).await.unwrap();
        responder.await.unwrap();

        assert_eq!(end, SessionEnd::InputClosed);
        assert_eq!(String::from_utf8(out).unwrap(), "> client read: ping\n> ");
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_not_sent() {
        let (mut client, mut peer) = tokio::io::duplex(1024);
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = peer.read(&mut buf).await.unwrap();
            peer.write_all(&buf[..n]).await.unwrap();
            let mut rest = Vec::new();
            peer.read_to_end(&mut rest).await.unwrap();
            rest
        });

        let mut out = Vec::new();
        let end = run(&mut client, &b"ping
partial"[..], &mut out).await.unwrap();
        drop(client);

        assert_eq!(end, SessionEnd::InputClosed);
        assert_eq!(String::from_utf8(out).unwrap(), "> client read: ping\n> ");
        assert!(responder.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_peer_close_ends_loop() {
        let (mut client, peer) = tokio::io::duplex(1024);
        drop(peer);

        let mut out = Vec::new();
        let end = run(&mut client, &b"hello\nworld\n"[..], &mut out).await;
        // writing to a dropped duplex fails with BrokenPipe before a read can see EOF
        match end {
            Ok(end) => assert_eq!(end, SessionEnd::PeerClosed),
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        }
    }

    #[tokio::test]
    async fn test_reply_without_newline_is_terminated() {
        let (mut client, mut peer) = tokio::io::duplex(1024);
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let _ = peer.read(&mut buf).await.unwrap();
            peer.write_all(b"ok").await.unwrap();
            peer.shutdown().await.unwrap();
            // keep the read side open until the client is done
            let _ = peer.read(&mut buf).await;
        });

        let mut out = Vec::new();
        let end = run(&mut client, &b"a\nb\n"[..], &mut out).await.unwrap();
        drop(client);
        responder.await.unwrap();

        assert_eq!(end, SessionEnd::PeerClosed);
        assert_eq!(String::from_utf8(out).unwrap(), "> client read: ok\n> ");
    }
}
