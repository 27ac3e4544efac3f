use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::event_log::EventLog;
use crate::models::Deal;
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

pub const NOT_CONFIGURED_MESSAGE: &str = "Please configure email settings.";

/// Credentials entered by the user for a polling run. Never written to disk.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl EmailConfig {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            sender: sender.into().trim().to_string(),
            receiver: receiver.into().trim().to_string(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.sender.is_empty() && !self.receiver.is_empty() && !self.password.is_empty()
    }
}

/// Sends deal alerts as plain-text email over implicit-TLS SMTP.
pub struct EmailNotifier {
    smtp: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(smtp: SmtpConfig) -> Self {
        EmailNotifier { smtp }
    }

    pub fn format_subject(&self, deal: &Deal) -> String {
        format!("Price Drop Alert: {}", deal.title)
    }

    pub fn format_text_body(&self, deal: &Deal) -> String {
        format!(
            "The price for '{}' has dropped to ${:.2}!\n\nBuy it now at:\n{}",
            deal.title, deal.price, deal.url
        )
    }

    pub fn build_message(&self, deal: &Deal, email: &EmailConfig) -> Result<Message> {
        let message = Message::builder()
            .from(email.sender.parse()?)
            .to(email.receiver.parse()?)
            .subject(self.format_subject(deal))
            .header(ContentType::TEXT_PLAIN)
            .body(self.format_text_body(deal))?;
        Ok(message)
    }

    fn build_transport(&self, email: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials = Credentials::new(email.sender.clone(), email.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.smtp.host)?
            .port(self.smtp.port)
            .timeout(Some(Duration::from_secs(self.smtp.timeout)))
            .credentials(credentials)
            .build();
        Ok(mailer)
    }

    async fn send(&self, deal: &Deal, email: &EmailConfig, log: &EventLog) -> Result<()> {
        let message = self.build_message(deal, email)?;

        log.info("  - Logging into email server...");
        let mailer = self.build_transport(email)?;
        // Connects and authenticates; send() would otherwise log in lazily.
        if !mailer.test_connection().await? {
            return Err(AppError::Email(format!("could not connect to {}", self.smtp.host)));
        }

        log.info("  - Sending email alert...");
        mailer.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl NotifierPlugin for EmailNotifier {
    fn name(&self) -> &str {
        "Email Notifier"
    }

    async fn notify(&self, deal: &Deal, email: &EmailConfig, log: &EventLog) -> NotificationResult {
        if !email.is_complete() {
            log.error(format!("  - Email not sent: {}", NOT_CONFIGURED_MESSAGE));
            return NotificationResult::Skipped(NOT_CONFIGURED_MESSAGE.to_string());
        }

        match self.send(deal, email, log).await {
            Ok(()) => {
                tracing::info!(url = %deal.url, receiver = %email.receiver, "Deal alert sent");
                log.deal("  - Email sent successfully!");
                NotificationResult::Sent
            }
            Err(e) => {
                log.error(format!("  - Failed to send email: {}", e));
                NotificationResult::Failed(e.to_string())
            }
        }
    }
}
