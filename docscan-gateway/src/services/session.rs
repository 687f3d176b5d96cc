//! Per-connection channel state machine
//!
//! ```text
//! Unassociated --announce(a)--> Associated(a) --announce(b)--> Associated(b)
//!       |                             |
//!       +----------close()------------+-----------> Closed
//! ```
//!
//! An announcement is the only way into `Associated`; closing the socket is the
//! only way into `Closed`. Malformed announcements leave the state unchanged.

use crate::services::registry::{ChannelRegistry, ClientChannel};
use docscan_common::{ChannelAnnouncement, RequestId, ScanType};
use thiserror::Error;
use tracing::{debug, info};

/// Lifecycle state of one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// Connected, no request id announced yet
    Unassociated,
    /// Registered under `request_id`
    Associated {
        request_id: RequestId,
        scan_type: ScanType,
    },
    /// Socket closed; terminal
    Closed,
}

/// Why an announcement was not applied
#[derive(Debug, Error)]
pub enum AnnouncementError {
    #[error("Malformed announcement: {0}")]
    Malformed(String),

    #[error("Channel is closed")]
    Closed,
}

/// Drives one channel's registration in the registry
#[derive(Debug)]
pub struct ChannelSession {
    channel: ClientChannel,
    state: ChannelState,
}

impl ChannelSession {
    pub fn new(channel: ClientChannel) -> Self {
        Self {
            channel,
            state: ChannelState::Unassociated,
        }
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn channel(&self) -> &ClientChannel {
        &self.channel
    }

    /// Currently announced request id, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        match &self.state {
            ChannelState::Associated { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Apply an announcement payload received from the client
    ///
    /// Announcing a different id evicts the previous one, if the registry
    /// still maps it to this channel.
    pub async fn announce(
        &mut self,
        payload: &str,
        registry: &dyn ChannelRegistry,
    ) -> Result<(), AnnouncementError> {
        if self.state == ChannelState::Closed {
            return Err(AnnouncementError::Closed);
        }

        let announcement: ChannelAnnouncement =
            payload.parse().map_err(AnnouncementError::Malformed)?;

        if let Some(previous) = self.request_id() {
            if *previous != announcement.id {
                let evicted = registry.release(previous, self.channel.id()).await;
                debug!(
                    channel_id = %self.channel.id(),
                    previous = %previous,
                    evicted,
                    "Channel re-announced a new request id"
                );
            }
        }

        registry
            .register(announcement.id.clone(), self.channel.clone())
            .await;

        info!(
            channel_id = %self.channel.id(),
            request_id = %announcement.id,
            scan_type = %announcement.scan_type,
            "Channel associated"
        );

        self.state = ChannelState::Associated {
            request_id: announcement.id,
            scan_type: announcement.scan_type,
        };
        Ok(())
    }

    /// Mark the channel closed and drop its registration
    pub async fn close(&mut self, registry: &dyn ChannelRegistry) {
        if let ChannelState::Associated { request_id, .. } = &self.state {
            registry.release(request_id, self.channel.id()).await;
        }
        if self.state != ChannelState::Closed {
            debug!(channel_id = %self.channel.id(), "Channel closed");
        }
        self.state = ChannelState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::InMemoryChannelRegistry;

    fn session() -> (ChannelSession, tokio::sync::mpsc::Receiver<docscan_common::ServerMessage>) {
        let (channel, rx) = ClientChannel::new(4);
        (ChannelSession::new(channel), rx)
    }

    #[tokio::test]
    async fn test_announcement_associates_and_registers() {
        let registry = InMemoryChannelRegistry::new();
        let (mut session, _rx) = session();
        assert_eq!(session.state(), &ChannelState::Unassociated);

        session
            .announce(r#"{"id":"req-1","type":"classify"}"#, &registry)
            .await
            .unwrap();

        assert_eq!(
            session.state(),
            &ChannelState::Associated {
                request_id: RequestId::new("req-1"),
                scan_type: ScanType::Classify,
            }
        );
        let found = registry.lookup(&RequestId::new("req-1")).await.unwrap();
        assert_eq!(found.id(), session.channel().id());
    }

    #[tokio::test]
    async fn test_malformed_announcement_leaves_state_unchanged() {
        let registry = InMemoryChannelRegistry::new();
        let (mut session, _rx) = session();

        let err = session.announce("{not json", &registry).await.unwrap_err();
        assert!(matches!(err, AnnouncementError::Malformed(_)));
        assert_eq!(session.state(), &ChannelState::Unassociated);
        assert_eq!(registry.registered_count().await, 0);

        session
            .announce(r#"{"id":"req-1","type":"metadata"}"#, &registry)
            .await
            .unwrap();
        session
            .announce(r#"{"id":"req-2","type":"bogus"}"#, &registry)
            .await
            .unwrap_err();
        assert_eq!(session.request_id(), Some(&RequestId::new("req-1")));
    }

    #[tokio::test]
    async fn test_reannouncement_evicts_previous_id() {
        let registry = InMemoryChannelRegistry::new();
        let (mut session, _rx) = session();

        session
            .announce(r#"{"id":"req-1","type":"classify"}"#, &registry)
            .await
            .unwrap();
        session
            .announce(r#"{"id":"req-2","type":"classify"}"#, &registry)
            .await
            .unwrap();

        assert!(registry.lookup(&RequestId::new("req-1")).await.is_none());
        assert!(registry.lookup(&RequestId::new("req-2")).await.is_some());
        assert_eq!(registry.registered_count().await, 1);
    }

    #[tokio::test]
    async fn test_reannouncement_keeps_id_taken_over_by_other_channel() {
        let registry = InMemoryChannelRegistry::new();
        let (mut first, _rx1) = session();
        let (mut second, _rx2) = session();

        first
            .announce(r#"{"id":"shared","type":"classify"}"#, &registry)
            .await
            .unwrap();
        second
            .announce(r#"{"id":"shared","type":"classify"}"#, &registry)
            .await
            .unwrap();
        first
            .announce(r#"{"id":"mine","type":"classify"}"#, &registry)
            .await
            .unwrap();

        let shared = registry.lookup(&RequestId::new("shared")).await.unwrap();
        assert_eq!(shared.id(), second.channel().id());
    }

    #[tokio::test]
    async fn test_close_unregisters_and_is_terminal() {
        let registry = InMemoryChannelRegistry::new();
        let (mut session, _rx) = session();
        session
            .announce(r#"{"id":"req-1","type":"classify"}"#, &registry)
            .await
            .unwrap();

        session.close(&registry).await;
        session.close(&registry).await;

        assert_eq!(session.state(), &ChannelState::Closed);
        assert!(registry.lookup(&RequestId::new("req-1")).await.is_none());

        let err = session
            .announce(r#"{"id":"req-3","type":"classify"}"#, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, AnnouncementError::Closed));
        assert_eq!(registry.registered_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_without_announcement() {
        let registry = InMemoryChannelRegistry::new();
        let (mut session, _rx) = session();
        session.close(&registry).await;
        assert_eq!(session.state(), &ChannelState::Closed);
    }
}
