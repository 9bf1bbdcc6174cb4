use crate::error::{NotifyError, Result};
use crate::{Notification, NotificationChannel};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use stormwatch_common::types::NotificationMethod;

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(smtp_port)
            .timeout(Some(timeout));

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
        })
    }

    fn format_subject(note: &Notification) -> String {
        format!(
            "[stormwatch][{}] {} - {}",
            note.severity, note.alert_type, note.rule_name
        )
    }

    fn format_body(note: &Notification) -> String {
        let location_line = note
            .location
            .as_deref()
            .map(|l| format!("\nLocation: {l}"))
            .unwrap_or_default();
        format!(
            "Alert: {severity}\nRule: {rule}\nType: {alert_type}{location_line}\n\n{message}\n\nTime: {time}",
            severity = note.severity,
            rule = note.rule_name,
            alert_type = note.alert_type,
            location_line = location_line,
            message = note.message,
            time = note.triggered_at,
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, note: &Notification, recipient: &str) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| NotifyError::InvalidConfig(format!("bad from address: {e}")))?,
            )
            .to(recipient
                .parse()
                .map_err(|e: lettre::address::AddressError| NotifyError::InvalidRecipient {
                    recipient: recipient.to_string(),
                    reason: e.to_string(),
                })?)
            .subject(Self::format_subject(note))
            .header(ContentType::TEXT_PLAIN)
            .body(Self::format_body(note))
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self.transport.send(email.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %recipient,
                        error = %e,
                        "Email send failed, retrying"
                    );
                    last_err = Some(e);
                    if attempt < 2 {
                        tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
                    }
                }
            }
        }

        let e = last_err.map_or_else(|| "unknown".to_string(), |e| e.to_string());
        tracing::error!(recipient = %recipient, error = %e, "Email send failed after 3 retries");
        Err(NotifyError::Smtp(e))
    }

    fn method(&self) -> NotificationMethod {
        NotificationMethod::Email
    }
}
