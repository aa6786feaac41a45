use async_trait::async_trait;
use serde::Serialize;

/// An outbound email, already rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Common interface for email backends.
///
/// `send` never fails past this boundary: transport, auth and API errors are
/// logged by the implementation and reported as `false`. Callers treat
/// `false` as "not delivered" and do not retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn send(&self, msg: &EmailMessage) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("mail backend not configured")]
    NotConfigured,
}

/// Used when no mail credentials are configured. Every send fails, so no
/// reminder is ever recorded as delivered.
#[derive(Debug, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn send(&self, msg: &EmailMessage) -> bool {
        tracing::warn!(to = %msg.to, error = %NotifyError::NotConfigured, "email not sent");
        false
    }
}
