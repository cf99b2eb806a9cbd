//! Error types for queue API calls.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Queue API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid queue configuration: {0}")]
    Config(String),
}

impl QueueError {
    pub fn http(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::Http {
            status: status.as_u16(),
            body: body.into(),
        }
    }
}
