//! Duplex message transport.
//!
//! A [`Transport`] is split into a cloneable write half ([`MessageSink`]) and a
//! single-consumer read half ([`Inbound`]). The transport never interprets
//! message content; framing turns the physical byte stream into discrete
//! [`Message`] units before they reach the layers above.

pub mod proxy;
pub mod stdio;

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

pub use proxy::{Direction, MessageObserver, MessageProxy, TracingObserver};

/// Maximum bytes per message (1 MiB). Framing never buffers more than one
/// byte past this for a single line.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Boxed future used at the object-safe seams of the transport and tool layers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport is closed")]
    Closed,
}

/// One self-delimited protocol unit (a single JSON document).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    bytes: Vec<u8>,
}

impl Message {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Serialize a JSON value into a message.
    pub fn from_json<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(value).map(Self::new)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Text rendering for diagnostics. Invalid UTF-8 is replaced, never rejected.
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

/// Write half of a transport.
///
/// Implementations must serialize physical writes so concurrently written
/// frames never interleave.
pub trait WriteMessage: Send + Sync + 'static {
    fn write<'a>(&'a self, message: &'a Message) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// Cloneable handle to the write half of a transport.
#[derive(Clone)]
pub struct MessageSink {
    inner: Arc<dyn WriteMessage>,
}

impl MessageSink {
    pub fn new(writer: impl WriteMessage) -> Self {
        Self {
            inner: Arc::new(writer),
        }
    }

    pub async fn write(&self, message: &Message) -> Result<(), TransportError> {
        self.inner.write(message).await
    }
}

impl std::fmt::Debug for MessageSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSink").finish_non_exhaustive()
    }
}

/// Read half of a transport: the inbound message sequence, in peer order.
///
/// Not restartable. Yields `None` once the peer has closed the stream.
#[derive(Debug)]
pub struct Inbound {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Inbound {
    pub fn new(rx: mpsc::UnboundedReceiver<Message>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

/// A duplex endpoint: writes and reads proceed independently.
#[derive(Debug)]
pub struct Transport {
    sink: MessageSink,
    inbound: Inbound,
}

impl Transport {
    pub fn from_parts(sink: MessageSink, inbound: Inbound) -> Self {
        Self { sink, inbound }
    }

    pub fn sink(&self) -> &MessageSink {
        &self.sink
    }

    pub async fn write(&self, message: &Message) -> Result<(), TransportError> {
        self.sink.write(message).await
    }

    pub fn into_parts(self) -> (MessageSink, Inbound) {
        (self.sink, self.inbound)
    }
}
