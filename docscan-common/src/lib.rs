//! # docscan Common Library
//!
//! Shared code for the docscan services including:
//! - Wire types exchanged over the result channel
//! - Batch splitting
//! - Configuration loading
//! - Common error type

pub mod batch;
pub mod config;
pub mod error;
pub mod messages;

pub use batch::{split, DEFAULT_BATCH_SIZE};
pub use error::{Error, Result};
pub use messages::{
    BatchMessage, ChannelAnnouncement, CompletionMessage, ItemResult, RequestId,
    ScanType, ServerMessage, ERROR_LABEL,
};
