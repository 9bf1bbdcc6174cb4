use crate::channels::{truncate_body, MAX_CAPTURED_BODY};
use crate::error::{NotifyError, Result};
use crate::{Notification, NotificationChannel};
use async_trait::async_trait;
use std::time::Duration;
use stormwatch_common::types::NotificationMethod;

/// SMS delivery through a generic JSON gateway (`POST {to, message}` with a
/// bearer token). The actual carrier integration lives behind the gateway.
pub struct SmsChannel {
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
}

impl SmsChannel {
    pub fn new(gateway_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            gateway_url: gateway_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn format_message(note: &Notification) -> String {
        // Keep SMS short: severity tag plus the event title
        format!(
            "[stormwatch][{severity}] {title}",
            severity = note.severity,
            title = note.title,
        )
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    async fn send(&self, note: &Notification, recipient: &str) -> Result<()> {
        let payload = serde_json::json!({
            "to": recipient,
            "message": Self::format_message(note),
        });

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self
                .client
                .post(&self.gateway_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %recipient,
                        status = status,
                        "SMS gateway returned error, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "sms gateway",
                        status,
                        body: truncate_body(&body, MAX_CAPTURED_BODY),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %recipient,
                        error = %e,
                        "SMS send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        let err = last_err.unwrap_or(NotifyError::InvalidConfig("no attempt made".into()));
        tracing::error!(recipient = %recipient, error = %err, "SMS failed after 3 retries");
        Err(err)
    }

    fn method(&self) -> NotificationMethod {
        NotificationMethod::Sms
    }
}
