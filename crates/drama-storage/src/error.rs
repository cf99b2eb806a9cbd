//! Error types for object storage operations.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(String),

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn s3(context: impl std::fmt::Display) -> Self {
        Self::S3(context.to_string())
    }
}
