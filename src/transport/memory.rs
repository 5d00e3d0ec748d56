use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Delivery, MessageTransport, TransportError};
use crate::router::AckDecision;

#[derive(Debug)]
struct Pending {
    body: Bytes,
    redelivered: bool,
}

/// In-process request queue with broker-style settlement
///
/// Capacity applies to newly published messages only; requeued messages
/// always go back in, so a `Nack` can never be lost to backpressure.
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    capacity: usize,
    depth: AtomicUsize,
    tx: mpsc::UnboundedSender<Pending>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Pending>>,
    next_tag: AtomicU64,
    unsettled: Mutex<HashMap<u64, Bytes>>,
    closed: CancellationToken,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = name.into();
        info!(queue = %name, capacity, "Request queue created");

        Self {
            name,
            capacity,
            depth: AtomicUsize::new(0),
            tx,
            rx: tokio::sync::Mutex::new(rx),
            next_tag: AtomicU64::new(1),
            unsettled: Mutex::new(HashMap::new()),
            closed: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a new message, failing fast when full or closed
    pub fn publish(&self, body: impl Into<Bytes>) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let reserved = self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                (depth < self.capacity).then_some(depth + 1)
            });
        if reserved.is_err() {
            return Err(TransportError::Full {
                capacity: self.capacity,
            });
        }

        self.push(Pending {
            body: body.into(),
            redelivered: false,
        })
        .inspect_err(|_| {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        })
    }

    fn push(&self, pending: Pending) -> Result<(), TransportError> {
        self.tx.send(pending).map_err(|_| TransportError::Closed)
    }

    /// Stop handing out deliveries; publishing fails from now on
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            info!(queue = %self.name, "Request queue closed");
        }
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Messages waiting for delivery
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Deliveries handed out but not yet settled
    pub fn unsettled(&self) -> usize {
        self.unsettled.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MessageTransport for MemoryQueue {
    async fn next(&self) -> Option<Delivery> {
        let mut rx = self.rx.lock().await;

        let pending = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return None,
            pending = rx.recv() => pending?,
        };
        self.depth.fetch_sub(1, Ordering::AcqRel);

        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut unsettled) = self.unsettled.lock() {
            unsettled.insert(tag, pending.body.clone());
        }

        debug!(queue = %self.name, tag, redelivered = pending.redelivered, "Delivering message");
        Some(Delivery {
            tag,
            body: pending.body,
            redelivered: pending.redelivered,
        })
    }

    async fn settle(&self, tag: u64, decision: AckDecision) -> Result<(), TransportError> {
        let body = self
            .unsettled
            .lock()
            .ok()
            .and_then(|mut unsettled| unsettled.remove(&tag))
            .ok_or(TransportError::UnknownTag(tag))?;

        match decision {
            AckDecision::Ack => debug!(queue = %self.name, tag, "Message acked"),
            AckDecision::Reject => {
                warn!(queue = %self.name, tag, "Message rejected and discarded")
            }
            AckDecision::Nack => {
                self.depth.fetch_add(1, Ordering::AcqRel);
                self.push(Pending {
                    body,
                    redelivered: true,
                })?;
                debug!(queue = %self.name, tag, "Message requeued");
            }
        }
        Ok(())
    }
}
