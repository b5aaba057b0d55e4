//! Observation shim around a [`Transport`].
//!
//! The proxy applies a side effect to every message in both directions and
//! otherwise relays them untouched: no reordering, dropping, duplication or
//! mutation.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use super::{BoxFuture, Inbound, Message, MessageSink, Transport, TransportError, WriteMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Side effect applied to each message passing through a [`MessageProxy`].
pub trait MessageObserver: Send + Sync + 'static {
    fn observe(&self, direction: Direction, message: &Message);
}

/// Logs every message through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MessageObserver for TracingObserver {
    fn observe(&self, direction: Direction, message: &Message) {
        tracing::debug!(direction = direction.as_str(), bytes = message.len(), "message");
        tracing::trace!(direction = direction.as_str(), "{}", message.to_text_lossy());
    }
}

pub struct MessageProxy;

impl MessageProxy {
    /// Wrap `transport`, returning a transport that observes before relaying.
    ///
    /// Spawns the inbound relay task, so this must be called inside a tokio
    /// runtime.
    pub fn wrap(transport: Transport, observer: Arc<dyn MessageObserver>) -> Transport {
        let (sink, mut inbound) = transport.into_parts();

        let (tx, rx) = mpsc::unbounded_channel();
        let relay_observer = Arc::clone(&observer);
        tokio::spawn(async move {
            while let Some(message) = inbound.next().await {
                relay_observer.observe(Direction::Inbound, &message);
                if tx.send(message).is_err() {
                    break;
                }
            }
        });

        let proxied = ObservedSink {
            inner: sink,
            observer,
            order: Mutex::new(()),
        };
        Transport::from_parts(MessageSink::new(proxied), Inbound::new(rx))
    }
}

struct ObservedSink {
    inner: MessageSink,
    observer: Arc<dyn MessageObserver>,
    // Held across observe + forward so the outbound log order is the wire order.
    order: Mutex<()>,
}

impl WriteMessage for ObservedSink {
    fn write<'a>(&'a self, message: &'a Message) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let _guard = self.order.lock().await;
            self.observer.observe(Direction::Outbound, message);
            self.inner.write(message).await
        })
    }
}
