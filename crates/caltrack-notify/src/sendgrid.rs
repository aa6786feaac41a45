use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::notifier::{EmailMessage, Notifier, NotifyError};

/// SendGrid v3 mail-send backend.
pub struct SendGridNotifier {
    client: reqwest::Client,
    api_key: String,
    from_email: String,
    base_url: String,
}

impl SendGridNotifier {
    pub fn new(
        api_key: String,
        from_email: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            from_email,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn try_send(&self, msg: &EmailMessage) -> Result<(), NotifyError> {
        let url = format!("{}/v3/mail/send", self.base_url);
        let body = build_request_body(&self.from_email, msg);

        debug!(to = %msg.to, subject = %msg.subject, "sending mail via SendGrid");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        // SendGrid answers 202 Accepted on success.
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status,
                message: text,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    fn name(&self) -> &str {
        "sendgrid"
    }

    async fn send(&self, msg: &EmailMessage) -> bool {
        match self.try_send(msg).await {
            Ok(()) => {
                info!(to = %msg.to, "email sent");
                true
            }
            Err(e) => {
                warn!(to = %msg.to, error = %e, "email send failed");
                false
            }
        }
    }
}

fn build_request_body(from: &str, msg: &EmailMessage) -> serde_json::Value {
    json!({
        "personalizations": [{ "to": [{ "email": msg.to }] }],
        "from": { "email": from },
        "subject": msg.subject,
        "content": [{ "type": "text/html", "value": msg.html_body }],
    })
}
