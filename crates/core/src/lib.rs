//! Core business logic for the delayed notifier.

pub mod cache;
pub mod queue;
pub mod retry;
pub mod services;

pub use cache::StatusCache;
pub use queue::{NoOpQueue, NotifyQueue, QueueHandle};
pub use retry::RetryPolicy;
pub use services::notify::{CreateNotificationRequest, NotifyService, ProcessingStats};
pub use services::recipient::RecipientResolver;
pub use services::sender::{ChannelSender, EmailSender, MultiSender, SenderHandle, TelegramSender};
