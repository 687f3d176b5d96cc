//! Channel registry
//!
//! Maps request ids to the live result channel of the client that announced
//! them. The registry is the only mutable state shared between upload sessions;
//! it is created once by the binary and handed to handlers through `AppState`.

use async_trait::async_trait;
use docscan_common::{RequestId, ServerMessage};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Send failed because the client side of the channel is gone
#[derive(Debug, Error)]
#[error("Channel {0} is closed")]
pub struct ChannelClosed(pub Uuid);

/// Server → client half of one result channel
///
/// Cheap to clone. The channel is open for as long as the connection's writer
/// holds the receiving end.
#[derive(Debug, Clone)]
pub struct ClientChannel {
    id: Uuid,
    tx: mpsc::Sender<ServerMessage>,
}

impl ClientChannel {
    /// Create a channel buffering up to `capacity` outbound messages
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    /// Unique id of this connection
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub async fn send(&self, message: ServerMessage) -> Result<(), ChannelClosed> {
        self.tx.send(message).await.map_err(|_| ChannelClosed(self.id))
    }
}

/// Request id → channel mapping
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Associate `id` with `channel`, replacing any previous entry for `id`
    async fn register(&self, id: RequestId, channel: ClientChannel);

    async fn lookup(&self, id: &RequestId) -> Option<ClientChannel>;

    /// Remove the entry for `id` if present
    async fn unregister(&self, id: &RequestId);

    /// Remove the entry for `id` only if it still belongs to `channel_id`
    ///
    /// Returns whether an entry was removed. Used when a channel closes or
    /// re-announces, so a newer registration of the same id is left alone.
    async fn release(&self, id: &RequestId, channel_id: Uuid) -> bool;

    /// Number of registered request ids
    async fn registered_count(&self) -> usize;
}

/// Process-local registry backed by a `HashMap`
#[derive(Debug, Default)]
pub struct InMemoryChannelRegistry {
    channels: RwLock<HashMap<RequestId, ClientChannel>>,
}

impl InMemoryChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelRegistry for InMemoryChannelRegistry {
    async fn register(&self, id: RequestId, channel: ClientChannel) {
        let channel_id = channel.id();
        let previous = self.channels.write().await.insert(id.clone(), channel);
        debug!(
            request_id = %id,
            channel_id = %channel_id,
            replaced = previous.is_some(),
            "Registered channel"
        );
    }

    async fn lookup(&self, id: &RequestId) -> Option<ClientChannel> {
        self.channels.read().await.get(id).cloned()
    }

    async fn unregister(&self, id: &RequestId) {
        if self.channels.write().await.remove(id).is_some() {
            debug!(request_id = %id, "Unregistered channel");
        }
    }

    async fn release(&self, id: &RequestId, channel_id: Uuid) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(id) {
            Some(channel) if channel.id() == channel_id => {
                channels.remove(id);
                debug!(request_id = %id, channel_id = %channel_id, "Released channel");
                true
            }
            _ => false,
        }
    }

    async fn registered_count(&self) -> usize {
        self.channels.read().await.len()
    }
}
