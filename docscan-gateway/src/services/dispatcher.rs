//! Batch dispatcher
//!
//! Classifies every file of one batch concurrently and joins on all of them.
//! A failed item (network error, error status, bad body, timeout) becomes the
//! `"Error"` sentinel for that item only; it never cancels its siblings and the
//! output always has one result per input, in input order.

use crate::services::classifier::{Classifier, ClassifierError};
use crate::services::storage::FileItem;
use docscan_common::{ItemResult, ScanType};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on one outbound classification call
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(20);

/// Fan-out/join-all executor for one batch
#[derive(Clone)]
pub struct BatchDispatcher {
    classifier: Arc<dyn Classifier>,
    item_timeout: Duration,
}

impl BatchDispatcher {
    pub fn new(classifier: Arc<dyn Classifier>, item_timeout: Duration) -> Self {
        Self {
            classifier,
            item_timeout,
        }
    }

    /// Classify all items of `batch`
    ///
    /// Every item's temporary file is released once its outcome is known.
    pub async fn dispatch(&self, batch: Vec<FileItem>, scan_type: ScanType) -> Vec<ItemResult> {
        let futures = batch
            .into_iter()
            .map(|item| self.dispatch_item(item, scan_type));

        join_all(futures).await
    }

    async fn dispatch_item(&self, item: FileItem, scan_type: ScanType) -> ItemResult {
        let outcome = match tokio::time::timeout(
            self.item_timeout,
            self.classifier.classify(scan_type, &item),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.item_timeout)),
        };

        let result = match outcome {
            Ok(response) => {
                debug!(filename = item.filename(), scan_type = %scan_type, "Item classified");
                response.into_item_result(scan_type, item.filename())
            }
            Err(e) => {
                warn!(
                    filename = item.filename(),
                    scan_type = %scan_type,
                    error = %e,
                    "Classification failed, substituting error result"
                );
                ItemResult::error(scan_type, item.filename())
            }
        };

        item.release().await;
        result
    }
}
