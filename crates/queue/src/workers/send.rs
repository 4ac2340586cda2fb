//! Delivery worker.

use apalis::prelude::*;
use notifier_core::NotifyService;
use std::sync::Arc;
use tracing::{error, info};

use crate::jobs::SendJob;

/// Context for the delivery worker.
#[derive(Clone)]
pub struct SendContext {
    /// Notification service with a configured sender.
    pub service: Arc<NotifyService>,
}

impl SendContext {
    /// Create a new delivery worker context.
    #[must_use]
    pub const fn new(service: Arc<NotifyService>) -> Self {
        Self { service }
    }
}

/// Worker function delivering one queued notification.
///
/// Returning `Ok` acknowledges the message. Send failures are already
/// recorded durably (with backoff rescheduling) by the service, so they ack
/// too — only infrastructure failures return `Err`, which nacks the message
/// and lets the broker redeliver it.
///
/// # Errors
/// Returns an error if the delivery outcome could not be recorded.
pub async fn send_worker(job: SendJob, ctx: Data<SendContext>) -> Result<(), Error> {
    let notification = job.into_inner();
    let id = notification.id;

    info!(id = %id, channel = %notification.channel, "processing delivery job");

    match ctx.service.deliver(notification).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(id = %id, error = %e, "failed to record delivery outcome");
            let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
            Err(Error::Failed(boxed.into()))
        }
    }
}
