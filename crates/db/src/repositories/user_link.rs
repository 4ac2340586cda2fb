//! Recipient link repository.

use notifier_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{user_email_link, user_telegram_link, UserEmailLink, UserTelegramLink};

/// Repository for the user → channel address link tables.
#[derive(Clone, Debug, Default)]
pub struct UserLinkRepository {
    _private: (),
}

impl UserLinkRepository {
    /// Create a new user link repository.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Look up the Telegram chat id linked to a user.
    pub async fn get_telegram_chat_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> AppResult<i64> {
        UserTelegramLink::find()
            .filter(user_telegram_link::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .map(|link| link.telegram_chat_id)
            .ok_or_else(|| {
                AppError::DataNotFound(format!("no telegram link for user {user_id}"))
            })
    }

    /// Look up the email address linked to a user.
    pub async fn get_email<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> AppResult<String> {
        UserEmailLink::find()
            .filter(user_email_link::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .map(|link| link.email)
            .ok_or_else(|| AppError::DataNotFound(format!("no email link for user {user_id}")))
    }
}
