//! Blob storage for the dropzone landing area.
//!
//! A [`BlobStore`] trait with filesystem and S3-compatible backends, plus
//! the transfer helpers and retrying orchestrator the HTTP service and CLI
//! are built on.

pub mod config;
pub mod error;
pub mod local;
pub mod orchestrator;
pub mod retry;
pub mod s3;
pub mod store;
pub mod transfer;

pub use config::{BlobBackend, BlobConfig};
pub use error::BlobError;
pub use local::LocalBlobStore;
pub use orchestrator::{BlobAction, BlobOrchestrator, OrchestrationOutput};
pub use retry::RetryPolicy;
pub use store::{BlobEntry, BlobStore};
