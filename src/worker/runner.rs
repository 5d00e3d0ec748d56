//! Processing of a single delivery

use std::sync::Arc;
use tracing::{error, warn};

use crate::fetchers::Fetch;
use crate::router::{AckDecision, Dispatcher};
use crate::transport::{Delivery, MessageTransport};

/// Run one delivery through the dispatcher and settle it
///
/// The dispatcher runs on its own task so a panic inside a pipeline is
/// contained and the message is requeued instead of lost.
pub async fn process_delivery<T, F>(
    transport: Arc<T>,
    dispatcher: Dispatcher<F>,
    delivery: Delivery,
) -> AckDecision
where
    T: MessageTransport + ?Sized,
    F: Fetch + 'static,
{
    let Delivery {
        tag,
        body,
        redelivered,
    } = delivery;
    if redelivered {
        warn!(tag, "Processing redelivered message");
    }

    let metrics = dispatcher.metrics().clone();
    let handle = tokio::spawn(async move { dispatcher.handle(&body).await });

    let decision = match handle.await {
        Ok(decision) => decision,
        Err(e) => {
            error!(tag, error = %e, "Pipeline task aborted, requeueing");
            AckDecision::Nack
        }
    };

    metrics.settled(decision);
    if let Err(e) = transport.settle(tag, decision).await {
        error!(tag, ?decision, error = %e, "Failed to settle delivery");
    }
    decision
}
