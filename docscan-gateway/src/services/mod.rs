//! Upload pipeline and external service clients
//!
//! Leaves first:
//! - `storage`: temporary upload files
//! - `registry`: request id → channel mapping
//! - `session`: per-channel announcement/close state machine
//! - `classifier`: classification service client
//! - `dispatcher`: concurrent classification of one batch
//! - `coordinator`: split → dispatch → deliver for one upload
//! - `pii_client`: PII scanning service client

pub mod classifier;
pub mod coordinator;
pub mod dispatcher;
pub mod pii_client;
pub mod registry;
pub mod session;
pub mod storage;

pub use classifier::{Classifier, ClassifierError, ClassifierResponse, HttpClassifier};
pub use coordinator::{UploadAck, UploadCoordinator, DEFAULT_SEND_TIMEOUT};
pub use dispatcher::BatchDispatcher;
pub use pii_client::{PiiClient, PiiError, PiiScanKind, PiiServiceRequest};
pub use registry::{ChannelClosed, ChannelRegistry, ClientChannel, InMemoryChannelRegistry};
pub use session::{AnnouncementError, ChannelSession, ChannelState};
pub use storage::{FileItem, StorageError, UploadStore};
