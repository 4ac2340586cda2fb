//! Redis-backed queue publisher.
//!
//! Implements the core [`NotifyQueue`] trait over apalis Redis storages,
//! one per channel. The channel acts as the routing key: each channel has
//! its own namespaced stream consumed by a matching worker.

use std::time::Duration;

use apalis::prelude::*;
use async_trait::async_trait;
use notifier_common::{AppError, AppResult};
use notifier_core::NotifyQueue;
use notifier_db::entities::notification::{self, NotifyChannel};
use tracing::{debug, warn};

use crate::jobs::SendJob;

/// Number of push attempts before a publish error is terminal.
const PUBLISH_ATTEMPTS: u32 = 3;

/// Base backoff between push attempts (doubles per attempt).
const PUBLISH_BACKOFF: Duration = Duration::from_millis(100);

/// Queue namespace for a channel's delivery jobs.
#[must_use]
pub fn channel_namespace(channel: NotifyChannel) -> String {
    format!("notifier:send:{}", channel.as_str())
}

/// Redis-backed notification publisher.
#[derive(Clone)]
pub struct RedisQueuePublisher {
    telegram: apalis_redis::RedisStorage<SendJob>,
    email: apalis_redis::RedisStorage<SendJob>,
}

impl RedisQueuePublisher {
    /// Create a new publisher over the per-channel storages.
    #[must_use]
    pub const fn new(
        telegram: apalis_redis::RedisStorage<SendJob>,
        email: apalis_redis::RedisStorage<SendJob>,
    ) -> Self {
        Self { telegram, email }
    }

    fn storage_for(&self, channel: NotifyChannel) -> apalis_redis::RedisStorage<SendJob> {
        match channel {
            NotifyChannel::Telegram => self.telegram.clone(),
            NotifyChannel::Email => self.email.clone(),
        }
    }
}

#[async_trait]
impl NotifyQueue for RedisQueuePublisher {
    async fn publish(&self, notification: &notification::Model) -> AppResult<()> {
        let mut storage = self.storage_for(notification.channel);
        let mut backoff = PUBLISH_BACKOFF;
        let mut last_error = String::new();

        for attempt in 1..=PUBLISH_ATTEMPTS {
            match storage.push(SendJob::new(notification.clone())).await {
                Ok(_) => {
                    debug!(
                        id = %notification.id,
                        channel = %notification.channel,
                        "queued delivery job"
                    );
                    return Ok(());
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < PUBLISH_ATTEMPTS {
                        warn!(
                            id = %notification.id,
                            attempt,
                            error = %last_error,
                            "queue push failed, backing off"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(AppError::Queue(format!(
            "failed to enqueue job after {PUBLISH_ATTEMPTS} attempts: {last_error}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_namespace() {
        assert_eq!(channel_namespace(NotifyChannel::Telegram), "notifier:send:telegram");
        assert_eq!(channel_namespace(NotifyChannel::Email), "notifier:send:email");
    }
}
