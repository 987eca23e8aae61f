//! Work queue implementations.

use async_trait::async_trait;
use orca_core::queue::{QueueMessage, WorkQueue};
use orca_core::{Error, JobId, Result};
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::sleep;
use tracing::{debug, error};

fn encode(job_id: JobId, source_ref: &str) -> Result<serde_json::Value> {
    serde_json::to_value(QueueMessage {
        job_id,
        source_ref: source_ref.to_string(),
    })
    .map_err(Error::dependency)
}

/// Decode a stored payload, dropping anything that is not a queue message.
fn decode(payload: serde_json::Value) -> Option<QueueMessage> {
    match serde_json::from_value(payload) {
        Ok(message) => Some(message),
        Err(e) => {
            error!(error = %e, "Dropping malformed queue message");
            None
        }
    }
}

/// Process-local queue.
///
/// Messages travel through an unbounded channel. Consumers take turns on the
/// receiver through a fair mutex, so each message reaches exactly one of them
/// in enqueue order.
pub struct MemoryWorkQueue {
    tx: mpsc::UnboundedSender<serde_json::Value>,
    rx: Mutex<mpsc::UnboundedReceiver<serde_json::Value>>,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl Default for MemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, job_id: JobId, source_ref: &str) -> Result<()> {
        self.tx
            .send(encode(job_id, source_ref)?)
            .map_err(|_| Error::Dependency("work queue closed".to_string()))?;
        debug!(job_id = %job_id, "Enqueued job");
        Ok(())
    }

    async fn dequeue(&self) -> Result<QueueMessage> {
        let mut rx = self.rx.lock().await;
        let payload = rx
            .recv()
            .await
            .ok_or_else(|| Error::Dependency("work queue closed".to_string()))?;
        serde_json::from_value(payload).map_err(Error::dependency)
    }
}

/// Queue backed by the `work_queue` table.
///
/// Popping deletes the row under `SKIP LOCKED`, so concurrent consumers never
/// see the same message and nothing is left behind to redeliver.
pub struct PgWorkQueue {
    pool: PgPool,
    poll_interval: Duration,
}

impl PgWorkQueue {
    pub fn new(pool: PgPool, poll_interval: Duration) -> Self {
        Self {
            pool,
            poll_interval,
        }
    }

    /// Pop the oldest message if there is one.
    pub async fn try_dequeue(&self) -> Result<Option<QueueMessage>> {
        let payload: Option<serde_json::Value> = sqlx::query_scalar(
            r#"
            DELETE FROM work_queue
            WHERE seq = (
                SELECT seq FROM work_queue
                ORDER BY seq ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING payload
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::dependency)?;

        Ok(payload.and_then(decode))
    }
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    async fn enqueue(&self, job_id: JobId, source_ref: &str) -> Result<()> {
        sqlx::query("INSERT INTO work_queue (payload) VALUES ($1)")
            .bind(encode(job_id, source_ref)?)
            .execute(&self.pool)
            .await
            .map_err(Error::dependency)?;
        debug!(job_id = %job_id, "Enqueued job");
        Ok(())
    }

    async fn dequeue(&self) -> Result<QueueMessage> {
        loop {
            if let Some(message) = self.try_dequeue().await? {
                return Ok(message);
            }
            sleep(self.poll_interval).await;
        }
    }
}
