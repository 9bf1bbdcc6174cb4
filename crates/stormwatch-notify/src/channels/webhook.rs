use crate::channels::{truncate_body, MAX_CAPTURED_BODY};
use crate::error::{NotifyError, Result};
use crate::{Notification, NotificationChannel};
use async_trait::async_trait;
use std::time::Duration;
use stormwatch_common::types::NotificationMethod;

/// Posts the firing as a JSON document to the rule's webhook URL.
pub struct WebhookChannel {
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn render_body(note: &Notification) -> serde_json::Value {
        serde_json::json!({
            "rule_id": note.rule_id,
            "rule_name": note.rule_name,
            "title": note.title,
            "message": note.message,
            "severity": note.severity.to_string(),
            "alert_type": note.alert_type.to_string(),
            "location": note.location,
            "coordinates": note.coordinates,
            "triggered_at": note.triggered_at.to_rfc3339(),
            "source_data": note.source_data,
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, note: &Notification, recipient: &str) -> Result<()> {
        let body = Self::render_body(note);

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self.client.post(recipient).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let resp_body = resp.text().await.unwrap_or_default();
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %recipient,
                        status = status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "webhook",
                        status,
                        body: truncate_body(&resp_body, MAX_CAPTURED_BODY),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %recipient,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        let err = last_err.unwrap_or(NotifyError::InvalidConfig("no attempt made".into()));
        tracing::error!(url = %recipient, error = %err, "Webhook failed after 3 retries");
        Err(err)
    }

    fn method(&self) -> NotificationMethod {
        NotificationMethod::Webhook
    }
}
