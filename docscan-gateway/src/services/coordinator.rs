//! Upload coordinator
//!
//! Runs one upload session end to end: look up the channel announced under the
//! request id, split the files into batches, dispatch the batches one after
//! another and push each batch's results to the channel, then send the
//! completion marker.
//!
//! Two outcomes are kept apart. The caller gets an [`UploadAck`] once every
//! batch has been processed. Delivery to the channel is best effort: if no
//! channel is registered, or it closes mid-session, the remaining messages are
//! dropped while processing carries on.

use crate::services::dispatcher::BatchDispatcher;
use crate::services::registry::{ChannelRegistry, ClientChannel};
use crate::services::storage::FileItem;
use docscan_common::{
    split, BatchMessage, CompletionMessage, RequestId, ScanType, ServerMessage,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long one message may wait for room in a full channel buffer
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Acknowledgment for the upload call
///
/// Confirms processing only; says nothing about delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAck {
    pub request_id: RequestId,
    pub batches: usize,
    pub items: usize,
}

/// Best-effort delivery target for one session
///
/// Once unavailable it stays unavailable for the rest of the session. A
/// client that stops reading is treated like one that disconnected.
enum Delivery {
    Open(ClientChannel),
    Unavailable,
}

impl Delivery {
    async fn send(&mut self, message: ServerMessage, send_timeout: Duration) -> bool {
        if let Delivery::Open(channel) = self {
            if channel.is_open() {
                let kind = message.kind();
                match tokio::time::timeout(send_timeout, channel.send(message)).await {
                    Ok(Ok(())) => return true,
                    Ok(Err(e)) => debug!(error = %e, kind, "Channel send failed, delivery stopped"),
                    Err(_) => warn!(
                        channel_id = %channel.id(),
                        kind,
                        timeout_ms = send_timeout.as_millis() as u64,
                        "Channel not drained in time, delivery stopped"
                    ),
                }
            } else {
                debug!(channel_id = %channel.id(), "Channel closed, delivery stopped");
            }
        }

        *self = Delivery::Unavailable;
        false
    }
}

/// Drives the split → dispatch → deliver pipeline
#[derive(Clone)]
pub struct UploadCoordinator {
    registry: Arc<dyn ChannelRegistry>,
    dispatcher: BatchDispatcher,
    batch_size: usize,
    send_timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(
        registry: Arc<dyn ChannelRegistry>,
        dispatcher: BatchDispatcher,
        batch_size: usize,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            batch_size,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Process one upload session
    ///
    /// Fails only for an invalid batch size; per-item and delivery failures
    /// are absorbed.
    pub async fn handle(
        &self,
        request_id: RequestId,
        scan_type: ScanType,
        files: Vec<FileItem>,
    ) -> docscan_common::Result<UploadAck> {
        let items = files.len();
        let batches = split(files, self.batch_size)?;
        let batch_count = batches.len();

        let mut delivery = match self.registry.lookup(&request_id).await {
            Some(channel) => Delivery::Open(channel),
            None => {
                info!(
                    request_id = %request_id,
                    "No channel registered, results will not be delivered"
                );
                Delivery::Unavailable
            }
        };

        info!(
            request_id = %request_id,
            scan_type = %scan_type,
            items,
            batches = batch_count,
            "Upload session started"
        );

        let mut delivered = 0usize;
        for (index, batch) in batches.into_iter().enumerate() {
            let results = self.dispatcher.dispatch(batch, scan_type).await;
            let failed = results.iter().filter(|r| r.is_error()).count();

            let message = ServerMessage::Batch(BatchMessage {
                request_id: request_id.clone(),
                scan_type,
                batch: results,
            });
            let sent = delivery.send(message, self.send_timeout).await;
            if sent {
                delivered += 1;
            }

            debug!(
                request_id = %request_id,
                batch = index + 1,
                of = batch_count,
                failed,
                delivered = sent,
                "Batch processed"
            );
        }

        let completion = ServerMessage::Completion(CompletionMessage::new(
            request_id.clone(),
            scan_type,
        ));
        let completed = delivery.send(completion, self.send_timeout).await;

        info!(
            request_id = %request_id,
            batches = batch_count,
            delivered,
            completion_delivered = completed,
            "Upload session finished"
        );

        Ok(UploadAck {
            request_id,
            batches: batch_count,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dispatcher::mock::{Behavior, MockClassifier};
    use crate::services::dispatcher::DEFAULT_ITEM_TIMEOUT;
    use crate::services::registry::InMemoryChannelRegistry;
    use crate::services::storage::UploadStore;
    use tokio::sync::mpsc;

    fn coordinator(
        registry: Arc<InMemoryChannelRegistry>,
        classifier: MockClassifier,
        batch_size: usize,
    ) -> UploadCoordinator {
        let dispatcher = BatchDispatcher::new(Arc::new(classifier), DEFAULT_ITEM_TIMEOUT);
        UploadCoordinator::new(registry, dispatcher, batch_size)
    }

    async fn files(store: &UploadStore, count: usize) -> Vec<FileItem> {
        let mut files = Vec::new();
        for i in 0..count {
            let name = format!("doc-{:02}.jpg", i);
            files.push(store.store(&name, None, b"data").await.unwrap());
        }
        files
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_twelve_files_stream_three_batches_then_completion() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let registry = Arc::new(InMemoryChannelRegistry::new());
        let (channel, mut rx) = ClientChannel::new(16);
        let id = RequestId::new("R");
        registry.register(id.clone(), channel).await;

        let coordinator = coordinator(Arc::clone(&registry), MockClassifier::new(), 5);
        let ack = coordinator
            .handle(id.clone(), ScanType::Classify, files(&store, 12).await)
            .await
            .unwrap();

        assert_eq!(ack.batches, 3);
        assert_eq!(ack.items, 12);

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 4);

        let mut expected_index = 0;
        for (message, size) in messages[..3].iter().zip([5, 5, 2]) {
            match message {
                ServerMessage::Batch(batch) => {
                    assert_eq!(batch.request_id, id);
                    assert_eq!(batch.scan_type, ScanType::Classify);
                    assert_eq!(batch.batch.len(), size);
                    for result in &batch.batch {
                        assert_eq!(result.filename(), format!("doc-{:02}.jpg", expected_index));
                        expected_index += 1;
                    }
                }
                other => panic!("expected batch, got {:?}", other),
            }
        }
        assert_eq!(
            messages[3],
            ServerMessage::Completion(CompletionMessage::new(id, ScanType::Classify))
        );
    }

    #[tokio::test]
    async fn test_without_channel_session_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let registry = Arc::new(InMemoryChannelRegistry::new());
        let classifier = MockClassifier::new();

        let coordinator = coordinator(Arc::clone(&registry), classifier, 5);
        let ack = coordinator
            .handle(RequestId::new("nobody"), ScanType::Metadata, files(&store, 7).await)
            .await
            .unwrap();

        assert_eq!(ack.batches, 2);
        assert_eq!(ack.items, 7);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_items_are_delivered_as_error_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let registry = Arc::new(InMemoryChannelRegistry::new());
        let (channel, mut rx) = ClientChannel::new(16);
        let id = RequestId::new("R");
        registry.register(id.clone(), channel).await;

        let classifier = MockClassifier::new().with("doc-01.jpg", Behavior::Fail);
        let coordinator = coordinator(Arc::clone(&registry), classifier, 5);
        coordinator
            .handle(id, ScanType::Classify, files(&store, 3).await)
            .await
            .unwrap();

        let messages = drain(&mut rx);
        match &messages[0] {
            ServerMessage::Batch(batch) => {
                assert_eq!(batch.batch.len(), 3);
                assert!(batch.batch[1].is_error());
                assert!(!batch.batch[0].is_error());
            }
            other => panic!("expected batch, got {:?}", other),
        }
        assert!(matches!(messages[1], ServerMessage::Completion(_)));
    }

    #[tokio::test]
    async fn test_empty_upload_sends_only_completion() {
        let registry = Arc::new(InMemoryChannelRegistry::new());
        let (channel, mut rx) = ClientChannel::new(4);
        let id = RequestId::new("R");
        registry.register(id.clone(), channel).await;

        let coordinator = coordinator(Arc::clone(&registry), MockClassifier::new(), 5);
        let ack = coordinator
            .handle(id.clone(), ScanType::Classify, Vec::new())
            .await
            .unwrap();

        assert_eq!(ack.batches, 0);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::Completion(CompletionMessage::new(id, ScanType::Classify))]
        );
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let registry = Arc::new(InMemoryChannelRegistry::new());
        let coordinator = coordinator(registry, MockClassifier::new(), 0);
        let result = coordinator
            .handle(RequestId::new("R"), ScanType::Classify, Vec::new())
            .await;
        assert!(matches!(result, Err(docscan_common::Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_stalled_reader_does_not_block_session() {
        // Given: a one-slot channel whose receiver is never read
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let registry = Arc::new(InMemoryChannelRegistry::new());
        let (channel, mut rx) = ClientChannel::new(1);
        let id = RequestId::new("R");
        registry.register(id.clone(), channel).await;

        let coordinator = coordinator(Arc::clone(&registry), MockClassifier::new(), 2)
            .with_send_timeout(Duration::from_millis(50));

        // When: the session produces more messages than the buffer holds
        let ack = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.handle(id, ScanType::Classify, files(&store, 6).await),
        )
        .await
        .expect("session should not wait on a stalled reader")
        .unwrap();

        // Then: processing finishes and only the first batch was queued
        assert_eq!(ack.batches, 3);
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ServerMessage::Batch(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
