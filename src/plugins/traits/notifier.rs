use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::event_log::EventLog;
use crate::models::Deal;
use crate::plugins::notifiers::email::EmailConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum NotificationResult {
    Sent,
    /// Nothing was attempted, e.g. credentials missing.
    Skipped(String),
    Failed(String),
}

/// Delivers deal alerts. Progress and failures are reported through the event log;
/// errors are never returned to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, deal: &Deal, email: &EmailConfig, log: &EventLog) -> NotificationResult;
}
