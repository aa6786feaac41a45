//! Outbound email for calibration reminders.
//!
//! [`Notifier`] is the seam the dispatcher talks to; [`SendGridNotifier`]
//! is the production backend and [`DisabledNotifier`] stands in when no API
//! key is configured.

pub mod notifier;
pub mod sendgrid;

use std::sync::Arc;
use std::time::Duration;

use caltrack_core::config::MailConfig;
use tracing::{info, warn};

pub use notifier::{DisabledNotifier, EmailMessage, Notifier, NotifyError};
pub use sendgrid::SendGridNotifier;

/// Pick the backend for `config`. A missing or blank API key yields the
/// disabled notifier rather than an error.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config
        .sendgrid_api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        Some(key) => {
            let notifier = SendGridNotifier::new(
                key.to_string(),
                config.from_email.clone(),
                config.api_base_url.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            info!(from = %config.from_email, "mail backend: sendgrid");
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("no SendGrid API key configured, reminder emails are disabled");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}
