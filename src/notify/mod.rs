pub mod templates;

use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// An outbound message the dispatcher asks a gateway to deliver. Delivery
/// failures are an operational concern, never a caller-facing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("smtp error: {0}")]
    Smtp(String),
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NotificationGateway for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if !self.config.enabled() {
            log::warn!(
                "smtp not configured, skipping notification to {}",
                notification.to
            );
            return Ok(());
        }

        let message = Message::builder()
            .from(
                self.config
                    .from_email
                    .parse()
                    .map_err(|e| NotifyError::Address(format!("from: {e}")))?,
            )
            .to(notification
                .to
                .parse()
                .map_err(|e| NotifyError::Address(format!("to: {e}")))?)
            .subject(notification.subject.clone())
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );
        let mailer = SmtpTransport::starttls_relay(&self.config.server)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(&message)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        log::info!("notification sent to {}", notification.to);
        Ok(())
    }
}
