//! Durable processing handoff queue.
//!
//! [`HandoffQueue`] is the at-least-once contract between upload completion
//! and the transcode consumer: publish is durable, a received message stays
//! owned by the consumer until acked (delete) or nacked (requeue), and
//! unacked messages survive a process restart. Consumers must therefore key
//! idempotency off the message's content hash.

pub mod error;
pub mod file;

pub use error::{QueueError, QueueResult};
pub use file::FileQueue;

use async_trait::async_trait;
use vidgate_core::models::ProcessingMessage;

/// One received message plus the receipt needed to settle it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub receipt: String,
    pub message: ProcessingMessage,
}

#[async_trait]
pub trait HandoffQueue: Send + Sync {
    /// Durably enqueue a message. Returns only after the message is persisted.
    async fn publish(&self, message: &ProcessingMessage) -> QueueResult<()>;

    /// Wait for the next available message. The message becomes in-flight and
    /// is not handed to another consumer until nacked or the process restarts.
    async fn receive(&self) -> QueueResult<Delivery>;

    /// Non-blocking variant of [`receive`](Self::receive).
    async fn try_receive(&self) -> QueueResult<Option<Delivery>>;

    /// Acknowledge successful processing; the message is gone for good.
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Negative-acknowledge: return the message to the queue for redelivery.
    async fn nack(&self, delivery: &Delivery) -> QueueResult<()>;
}
