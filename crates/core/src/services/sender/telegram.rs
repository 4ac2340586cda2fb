//! Telegram Bot API sender.
//!
//! Sends messages via `POST /bot<token>/sendMessage`.

use async_trait::async_trait;
use notifier_common::{AppError, AppResult};
use notifier_db::entities::notification;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::ChannelSender;

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Telegram notification sender.
#[derive(Clone)]
pub struct TelegramSender {
    bot_token: String,
    client: Client,
}

impl TelegramSender {
    /// Create a new Telegram sender for the given bot token.
    #[must_use]
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token)
    }
}

#[async_trait]
impl ChannelSender for TelegramSender {
    async fn send(&self, notification: &notification::Model) -> AppResult<()> {
        let chat_id: i64 = notification.recipient_identifier.parse().map_err(|_| {
            AppError::Validation(format!(
                "invalid telegram chat_id '{}'",
                notification.recipient_identifier
            ))
        })?;

        let payload = json!({
            "chat_id": chat_id,
            "text": truncate_message(&notification.payload, TELEGRAM_MESSAGE_LIMIT),
            "parse_mode": "HTML",
        });

        debug!(id = %notification.id, chat_id, "sending telegram message");

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("telegram request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(id = %notification.id, chat_id, "telegram message sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::ExternalService(format!(
            "telegram sendMessage failed: {status} - {body}"
        )))
    }
}

/// Truncate a message to fit within the Telegram character limit.
fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "\n\n[truncated]";
    let budget = limit - suffix.len();
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notifier_db::entities::notification::{NotifyChannel, NotifyStatus};
    use uuid::Uuid;

    fn notification_to(recipient: &str) -> notification::Model {
        notification::Model {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            channel: NotifyChannel::Telegram,
            payload: "hello".to_string(),
            recipient_identifier: recipient.to_string(),
            scheduled_at: Utc::now().into(),
            sent_at: None,
            status: NotifyStatus::InProcess,
            retry_count: 0,
            last_error: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_invalid_chat_id_fails_before_network() {
        let sender = TelegramSender::new("123:ABC".to_string());
        let n = notification_to("not-a-number");

        let result = sender.send(&n).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_endpoint_includes_token() {
        let sender = TelegramSender::new("123:ABC".to_string());
        assert_eq!(
            sender.endpoint(),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("hello", 100), "hello");

        let long: String = "a".repeat(5000);
        let truncated = truncate_message(&long, TELEGRAM_MESSAGE_LIMIT);
        assert!(truncated.chars().count() <= TELEGRAM_MESSAGE_LIMIT);
        assert!(truncated.ends_with("[truncated]"));
    }
}
