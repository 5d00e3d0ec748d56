//! Request message transport
//!
//! The worker only needs two things from a broker: the next delivery and a
//! way to settle it. [`MemoryQueue`] provides both in-process and is what
//! the HTTP ingest surface publishes into.

mod memory;

pub use memory::MemoryQueue;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::router::AckDecision;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Queue is closed")]
    Closed,

    #[error("Queue is full ({capacity} messages)")]
    Full { capacity: usize },

    #[error("Unknown delivery tag {0}")]
    UnknownTag(u64),
}

/// One message handed to the worker, awaiting settlement
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub body: Bytes,
    /// Set when the message was requeued by an earlier `Nack`
    pub redelivered: bool,
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Wait for the next delivery; `None` once the transport is closed
    async fn next(&self) -> Option<Delivery>;

    /// Ack, reject or requeue a delivery
    async fn settle(&self, tag: u64, decision: AckDecision) -> Result<(), TransportError>;
}
