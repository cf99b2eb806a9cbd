//! S3-compatible object storage for the ShortDrama worker.
//!
//! Raw uploads land in one bucket, finished artifacts in another; every
//! operation names its bucket explicitly.

pub mod client;
pub mod error;

pub use client::{ObjectInfo, S3Config, StorageClient};
pub use error::{StorageError, StorageResult};
