//! Push transport abstraction

use async_trait::async_trait;
use telesync_core::MetricId;

use crate::Result;

/// Lifecycle and data events emitted by a push transport
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// First successful connection
    Connected,
    /// Connection re-established after a drop
    Reconnected { attempt: u32 },
    /// Connection lost
    Disconnected { reason: String },
    /// Server accepted the authentication handshake
    Authenticated,
    /// Last-value notification for a subscribed metric; `payload` is the
    /// JSON-encoded `{value, timestamp}` object exactly as received
    Value { metric: MetricId, payload: String },
    /// Non-fatal transport error (e.g. reconnect ceiling reached)
    Error { message: String },
}

/// Outbound side of a push channel
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Send the authentication handshake
    async fn authenticate(&self) -> Result<()>;

    /// Publish the subscribe intent for `metric`
    async fn subscribe(&self, metric: &MetricId) -> Result<()>;

    /// Publish the unsubscribe intent for `metric`
    async fn unsubscribe(&self, metric: &MetricId) -> Result<()>;

    /// Whether the underlying connection is currently up
    fn is_connected(&self) -> bool;

    /// Tear the channel down; no reconnect follows
    fn close(&self) {}
}
