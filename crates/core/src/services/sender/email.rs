//! SMTP email sender.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use notifier_common::config::EmailConfig;
use notifier_common::{AppError, AppResult};
use notifier_db::entities::notification;
use tracing::debug;

use super::ChannelSender;

/// Subject line for delivered notifications.
const SUBJECT: &str = "Notification";

/// Email notification sender over SMTP.
#[derive(Clone)]
pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailSender {
    /// Create a new email sender from the SMTP configuration.
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| AppError::Validation(format!("invalid from address: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| AppError::Validation(format!("invalid smtp relay: {e}")))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    async fn send(&self, notification: &notification::Model) -> AppResult<()> {
        let to: Mailbox = notification.recipient_identifier.parse().map_err(|e| {
            AppError::Validation(format!(
                "invalid email address '{}': {e}",
                notification.recipient_identifier
            ))
        })?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.payload.clone())
            .map_err(|e| AppError::Internal(format!("failed to build email: {e}")))?;

        debug!(id = %notification.id, to = %notification.recipient_identifier, "sending email");

        self.mailer
            .send(email)
            .await
            .map_err(|e| AppError::ExternalService(format!("failed to send email: {e}")))?;

        debug!(id = %notification.id, "email sent");
        Ok(())
    }
}
