//! Notification delivery job.

use notifier_db::entities::notification;
use serde::{Deserialize, Serialize};

/// Job to deliver one notification.
///
/// Transparent wrapper: the queued payload is exactly the notification's
/// JSON serialization (`application/json` on the wire).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SendJob(pub notification::Model);

impl SendJob {
    /// Create a new send job.
    #[must_use]
    pub const fn new(notification: notification::Model) -> Self {
        Self(notification)
    }

    /// The wrapped notification.
    #[must_use]
    pub const fn notification(&self) -> &notification::Model {
        &self.0
    }

    /// Unwrap into the notification.
    #[must_use]
    pub fn into_inner(self) -> notification::Model {
        self.0
    }
}
