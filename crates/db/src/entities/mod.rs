//! Database entities.

pub mod notification;
pub mod user_email_link;
pub mod user_telegram_link;

pub use notification::Entity as Notification;
pub use user_email_link::Entity as UserEmailLink;
pub use user_telegram_link::Entity as UserTelegramLink;
