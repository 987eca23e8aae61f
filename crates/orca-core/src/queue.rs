//! Work queue contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{JobId, Result};

/// Dispatch message handed to exactly one worker.
///
/// Serialized whole as `{"jobId": ..., "sourceRef": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub job_id: JobId,
    pub source_ref: String,
}

/// FIFO channel with blocking single-consumer delivery.
///
/// Delivery is at-most-once: a message belongs to the queue only until one
/// consumer pops it. There is no acknowledgment and no redelivery.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append a message. Never waits for capacity.
    async fn enqueue(&self, job_id: JobId, source_ref: &str) -> Result<()>;

    /// Pop the oldest message, waiting without bound until one exists.
    async fn dequeue(&self) -> Result<QueueMessage>;

    /// Like `dequeue`, but gives up after `timeout` and returns `None`.
    async fn dequeue_timeout(&self, timeout: Duration) -> Result<Option<QueueMessage>> {
        match tokio::time::timeout(timeout, self.dequeue()).await {
            Ok(message) => message.map(Some),
            Err(_) => Ok(None),
        }
    }
}
