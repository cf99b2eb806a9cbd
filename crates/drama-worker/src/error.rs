//! Worker error type: everything that can abort a claimed job.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Media(#[from] drama_media::MediaError),

    #[error(transparent)]
    Queue(#[from] drama_queue::QueueError),

    #[error(transparent)]
    Storage(#[from] drama_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Job(String),
}

impl WorkerError {
    pub fn job(message: impl Into<String>) -> Self {
        Self::Job(message.into())
    }
}
