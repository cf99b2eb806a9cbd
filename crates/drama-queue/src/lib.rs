//! Client for the controller's worker job API.
//!
//! Covers the four lifecycle endpoints: claim, progress, complete, fail.

pub mod client;
pub mod error;

pub use client::{QueueClient, QueueConfig};
pub use error::{QueueError, QueueResult};
