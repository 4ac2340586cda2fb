//! Channel senders.
//!
//! Each delivery channel has a concrete sender; [`MultiSender`] is the
//! facade the dispatcher talks to, selecting the sender by the
//! notification's channel.

mod email;
mod telegram;

pub use email::EmailSender;
pub use telegram::TelegramSender;

use async_trait::async_trait;
use notifier_common::{AppError, AppResult};
use notifier_db::entities::notification::{self, NotifyChannel};
use std::sync::Arc;

/// Trait for sending a notification over one channel.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Deliver the payload to the notification's recipient.
    async fn send(&self, notification: &notification::Model) -> AppResult<()>;
}

/// Shared handle to a sender implementation.
pub type SenderHandle = Arc<dyn ChannelSender>;

/// Channel-multiplexing sender facade.
///
/// Unconfigured channels report `UnsupportedChannel` instead of failing
/// silently, so misrouted notifications end up in `failed` with a clear
/// `last_error`.
pub struct MultiSender {
    telegram: Option<TelegramSender>,
    email: Option<EmailSender>,
}

impl MultiSender {
    /// Create a new multi sender from the configured channel senders.
    #[must_use]
    pub const fn new(telegram: Option<TelegramSender>, email: Option<EmailSender>) -> Self {
        Self { telegram, email }
    }

    /// Whether at least one channel sender is configured.
    #[must_use]
    pub const fn has_any_channel(&self) -> bool {
        self.telegram.is_some() || self.email.is_some()
    }
}

#[async_trait]
impl ChannelSender for MultiSender {
    async fn send(&self, notification: &notification::Model) -> AppResult<()> {
        match notification.channel {
            NotifyChannel::Telegram => match &self.telegram {
                Some(sender) => sender.send(notification).await,
                None => Err(AppError::UnsupportedChannel(
                    "telegram sender not configured".to_string(),
                )),
            },
            NotifyChannel::Email => match &self.email {
                Some(sender) => sender.send(notification).await,
                None => Err(AppError::UnsupportedChannel(
                    "email sender not configured".to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn notification(channel: NotifyChannel) -> notification::Model {
        notification::Model {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            channel,
            payload: "hello".to_string(),
            recipient_identifier: "42".to_string(),
            scheduled_at: Utc::now().into(),
            sent_at: None,
            status: notification::NotifyStatus::InProcess,
            retry_count: 0,
            last_error: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_channels_are_unsupported() {
        let sender = MultiSender::new(None, None);
        assert!(!sender.has_any_channel());

        let result = sender.send(&notification(NotifyChannel::Telegram)).await;
        assert!(matches!(result, Err(AppError::UnsupportedChannel(_))));

        let result = sender.send(&notification(NotifyChannel::Email)).await;
        assert!(matches!(result, Err(AppError::UnsupportedChannel(_))));
    }
}
