//! Recipient resolution.

use notifier_common::{AppError, AppResult};
use notifier_db::entities::notification::NotifyChannel;
use notifier_db::repositories::UserLinkRepository;
use sea_orm::ConnectionTrait;
use uuid::Uuid;

/// Resolves `(user_id, channel)` to a channel-specific address.
///
/// Runs on the caller's executor so that create can resolve and insert in
/// the same transaction — there is no window where a deleted user link
/// leaves a dangling recipient.
#[derive(Clone, Debug, Default)]
pub struct RecipientResolver {
    links: UserLinkRepository,
}

impl RecipientResolver {
    /// Create a new recipient resolver.
    #[must_use]
    pub const fn new(links: UserLinkRepository) -> Self {
        Self { links }
    }

    /// Resolve the recipient identifier for a user on a channel.
    ///
    /// Telegram chat ids are rendered as decimal text; emails pass through
    /// as stored. A missing link maps to `RecipientNotFound`.
    pub async fn resolve<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
        channel: NotifyChannel,
    ) -> AppResult<String> {
        match channel {
            NotifyChannel::Telegram => {
                let chat_id = self
                    .links
                    .get_telegram_chat_id(conn, user_id)
                    .await
                    .map_err(|e| match e {
                        AppError::DataNotFound(_) => AppError::RecipientNotFound(format!(
                            "telegram chat_id not found for user {user_id}"
                        )),
                        other => other,
                    })?;
                Ok(chat_id.to_string())
            }
            NotifyChannel::Email => {
                self.links.get_email(conn, user_id).await.map_err(|e| match e {
                    AppError::DataNotFound(_) => AppError::RecipientNotFound(format!(
                        "email not found for user {user_id}"
                    )),
                    other => other,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use notifier_db::entities::{user_email_link, user_telegram_link};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_resolve_telegram_renders_decimal_text() {
        let user_id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_telegram_link::Model {
                user_id,
                telegram_chat_id: -1_001_234,
            }]])
            .into_connection();

        let resolver = RecipientResolver::new(UserLinkRepository::new());
        let recipient = resolver
            .resolve(&db, user_id, NotifyChannel::Telegram)
            .await
            .unwrap();
        assert_eq!(recipient, "-1001234");
    }

    #[tokio::test]
    async fn test_resolve_email() {
        let user_id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_email_link::Model {
                user_id,
                email: "a@x.example".to_string(),
            }]])
            .into_connection();

        let resolver = RecipientResolver::new(UserLinkRepository::new());
        let recipient = resolver
            .resolve(&db, user_id, NotifyChannel::Email)
            .await
            .unwrap();
        assert_eq!(recipient, "a@x.example");
    }

    #[tokio::test]
    async fn test_missing_link_maps_to_recipient_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user_telegram_link::Model>::new()])
            .into_connection();

        let resolver = RecipientResolver::new(UserLinkRepository::new());
        let result = resolver
            .resolve(&db, Uuid::now_v7(), NotifyChannel::Telegram)
            .await;
        assert!(matches!(result, Err(AppError::RecipientNotFound(_))));
    }
}
