//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    #[sea_orm(string_value = "telegram")]
    Telegram,
    #[sea_orm(string_value = "email")]
    Email,
}

impl NotifyChannel {
    /// Channel name as used for queue routing.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum NotifyStatus {
    /// Waiting to be claimed by the scheduler.
    #[sea_orm(string_value = "waiting")]
    Waiting,
    /// Claimed and published; a worker is delivering it.
    #[sea_orm(string_value = "in_process")]
    InProcess,
    /// Delivered. Terminal.
    #[sea_orm(string_value = "sent")]
    Sent,
    /// Last send attempt failed. Terminal unless rescheduled.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Cancelled by the user. Terminal.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl NotifyStatus {
    /// Whether no further transition is permitted from this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Cancelled)
    }

    /// Status name as exposed over the HTTP surface.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::InProcess => "in_process",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for NotifyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled notification.
///
/// The Model's JSON form is both the bus wire format and the cache value.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User the notification is addressed to.
    #[sea_orm(indexed)]
    pub user_id: Uuid,

    /// Delivery channel.
    pub channel: NotifyChannel,

    /// Opaque UTF-8 text to deliver.
    #[sea_orm(column_type = "Text")]
    pub payload: String,

    /// Channel-specific address resolved at create time
    /// (chat id for telegram, RFC 5321 address for email).
    pub recipient_identifier: String,

    /// Earliest time delivery may be attempted.
    #[sea_orm(indexed)]
    pub scheduled_at: DateTimeWithTimeZone,

    /// Set on the transition into `sent`, absent otherwise.
    #[sea_orm(nullable)]
    pub sent_at: Option<DateTimeWithTimeZone>,

    /// Current status.
    pub status: NotifyStatus,

    /// Number of failed send attempts. Monotonic, never reset.
    #[sea_orm(default_value = 0)]
    pub retry_count: i32,

    /// Error of the last failed attempt, cleared on reschedule/success.
    #[sea_orm(nullable)]
    pub last_error: Option<String>,

    /// When this notification was created.
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Model {
        Model {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            channel: NotifyChannel::Email,
            payload: "hello".to_string(),
            recipient_identifier: "a@x.example".to_string(),
            scheduled_at: Utc::now().into(),
            sent_at: None,
            status: NotifyStatus::Waiting,
            retry_count: 0,
            last_error: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let original = sample();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_value(NotifyStatus::InProcess).unwrap();
        assert_eq!(json, serde_json::json!("in_process"));
        let json = serde_json::to_value(NotifyChannel::Telegram).unwrap();
        assert_eq!(json, serde_json::json!("telegram"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(NotifyStatus::Sent.is_terminal());
        assert!(NotifyStatus::Cancelled.is_terminal());
        assert!(!NotifyStatus::Waiting.is_terminal());
        assert!(!NotifyStatus::InProcess.is_terminal());
        assert!(!NotifyStatus::Failed.is_terminal());
    }
}
