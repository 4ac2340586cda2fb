//! Notification queue abstraction.
//!
//! Provides the seam that lets the service publish claimed notifications
//! without depending on the queue implementation. The production
//! implementation lives in the queue crate.

use async_trait::async_trait;
use notifier_common::AppResult;
use notifier_db::entities::notification;
use std::sync::Arc;

/// Trait for publishing notifications to the delivery queue.
///
/// The payload on the wire is the notification's JSON form; routing is by
/// channel.
#[async_trait]
pub trait NotifyQueue: Send + Sync {
    /// Durably enqueue a notification for delivery.
    async fn publish(&self, notification: &notification::Model) -> AppResult<()>;
}

/// Shared handle to a queue implementation.
pub type QueueHandle = Arc<dyn NotifyQueue>;

/// A no-op implementation for tests.
#[derive(Clone, Default)]
pub struct NoOpQueue;

#[async_trait]
impl NotifyQueue for NoOpQueue {
    async fn publish(&self, _notification: &notification::Model) -> AppResult<()> {
        Ok(())
    }
}
