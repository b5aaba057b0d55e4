//! Newline-delimited framing over an async byte stream.
//!
//! Each message occupies exactly one line. Blank lines are skipped, trailing
//! `\r\n` is stripped, and every outbound message is followed by `\n` and a
//! flush. A line longer than the limit is cut to `limit + 1` bytes and the
//! rest of it is discarded, so oversized input is still visible as oversized
//! without being held in memory.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::{mpsc, Mutex};

use super::{
    BoxFuture, Inbound, Message, MessageSink, Transport, TransportError, WriteMessage,
    MAX_MESSAGE_BYTES,
};

impl Transport {
    /// Bind the process stdin (inbound) and stdout (outbound).
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Bind an arbitrary reader/writer pair with line framing.
    ///
    /// Spawns the reader task, so this must be called inside a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::with_line_limit(reader, writer, MAX_MESSAGE_BYTES)
    }

    /// Like [`Transport::new`] with a custom per-line limit in bytes.
    pub fn with_line_limit<R, W>(reader: R, writer: W, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(read_lines(reader, limit, tx));
        Self::from_parts(MessageSink::new(LineWriter::new(writer)), Inbound::new(rx))
    }
}

async fn read_lines<R>(reader: R, limit: usize, tx: mpsc::UnboundedSender<Message>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);

    loop {
        raw.clear();
        match (&mut reader).take(cap).read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "inbound stream failed, treating as closed");
                break;
            }
        }

        if raw.len() > limit && raw.last() != Some(&b'\n') {
            tracing::warn!(limit, "inbound line over limit, discarding the rest");
            if let Err(e) = discard_line(&mut reader).await {
                tracing::warn!(error = %e, "inbound stream failed, treating as closed");
                break;
            }
        }

        let line = trim_line_ending(&raw);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        if tx.send(Message::new(line.to_vec())).is_err() {
            // Consumer dropped; nobody is listening any more.
            break;
        }
    }

    tracing::debug!("inbound stream reached end of input");
}

/// Skip input up to and including the next `\n`.
async fn discard_line<B>(reader: &mut B) -> std::io::Result<()>
where
    B: AsyncBufRead + Unpin,
{
    loop {
        let (consumed, done) = {
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(());
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(());
        }
    }
}

fn trim_line_ending(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

/// Serialized line writer. The first I/O failure closes it for good.
struct LineWriter<W> {
    writer: Mutex<W>,
    closed: AtomicBool,
}

impl<W> LineWriter<W> {
    fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }
}

impl<W> WriteMessage for LineWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn write<'a>(&'a self, message: &'a Message) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            if self.closed.load(Ordering::Acquire) {
                return Err(TransportError::Closed);
            }

            let mut writer = self.writer.lock().await;
            let result = async {
                writer.write_all(message.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            }
            .await;

            if let Err(e) = result {
                self.closed.store(true, Ordering::Release);
                return Err(TransportError::Io(e));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn splits_lines_and_skips_blanks() {
        let (mut peer, server_side) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let transport = Transport::new(reader, writer);
        let (_sink, mut inbound) = transport.into_parts();

        peer.write_all(b"{\"a\":1}\r\n\n   \n{\"b\":2}\n").await.unwrap();
        drop(peer);

        assert_eq!(inbound.next().await.unwrap().as_bytes(), b"{\"a\":1}");
        assert_eq!(inbound.next().await.unwrap().as_bytes(), b"{\"b\":2}");
        assert!(inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn final_line_without_newline_is_delivered() {
        let (mut peer, server_side) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let (_sink, mut inbound) = Transport::new(reader, writer).into_parts();

        peer.write_all(b"{\"last\":true}").await.unwrap();
        drop(peer);

        assert_eq!(inbound.next().await.unwrap().as_bytes(), b"{\"last\":true}");
        assert!(inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn oversized_line_is_cut_and_the_rest_skipped() {
        let (mut peer, server_side) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let (_sink, mut inbound) = Transport::with_line_limit(reader, writer, 8).into_parts();

        peer.write_all(b"0123456789abcdef\n{\"ok\":1}\n12345678\n").await.unwrap();
        drop(peer);

        assert_eq!(inbound.next().await.unwrap().as_bytes(), b"012345678");
        assert_eq!(inbound.next().await.unwrap().as_bytes(), b"{\"ok\":1}");
        assert_eq!(inbound.next().await.unwrap().as_bytes(), b"12345678");
        assert!(inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn writes_are_newline_terminated() {
        let (mut peer, server_side) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let transport = Transport::new(reader, writer);

        transport.write(&Message::from("one")).await.unwrap();
        transport.write(&Message::from("two")).await.unwrap();

        let mut out = [0u8; 8];
        peer.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"one\ntwo\n");
    }

    #[tokio::test]
    async fn write_after_peer_closed_fails_then_stays_closed() {
        let (peer, server_side) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(server_side);
        let transport = Transport::new(reader, writer);
        drop(peer);

        let first = transport.write(&Message::from("lost")).await;
        assert!(matches!(first, Err(TransportError::Io(_))));

        let second = transport.write(&Message::from("lost again")).await;
        assert!(matches!(second, Err(TransportError::Closed)));
    }
}
