//! Subscriber endpoints.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{SinkError, SinkResult};

/// Write endpoint for one subscriber.
///
/// Transport adapters (a websocket writer, an SSE stream) implement this. The
/// hub owns the sink while subscribed but never the underlying connection.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Deliver one encoded message. Any error prunes the subscriber.
    async fn send(&self, message: &str) -> SinkResult<()>;
}

/// Identifier handed out by [`ProgressHub::subscribe`](crate::ProgressHub::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sink backed by a bounded mpsc channel.
///
/// The paired receiver belongs to whatever task writes to the real
/// connection; dropping it closes the sink.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn send(&self, message: &str) -> SinkResult<()> {
        self.tx
            .send(message.to_owned())
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Create a [`ChannelSink`] and the receiver a transport writer drains.
pub fn channel_sink(capacity: usize) -> (ChannelSink, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink::new(tx), rx)
}
