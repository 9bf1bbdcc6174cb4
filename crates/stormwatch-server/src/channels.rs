use crate::config::ServerConfig;
use anyhow::{Context, Result};
use std::time::Duration;
use stormwatch_notify::channels::{email::EmailChannel, sms::SmsChannel, webhook::WebhookChannel};
use stormwatch_notify::dispatcher::Dispatcher;
use stormwatch_notify::NotificationChannel;

/// Builds the dispatcher from the channel sections of the server config.
/// Disabled sections simply leave their method unregistered; deliveries
/// through such a method fail with an explanatory message.
pub fn build_dispatcher(config: &ServerConfig) -> Result<Dispatcher> {
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

    if config.smtp.enabled {
        let channel = EmailChannel::new(
            &config.smtp.host,
            config.smtp.port,
            config.smtp.username.as_deref(),
            config.smtp.password.as_deref(),
            &config.smtp.from,
            Duration::from_secs(config.smtp.timeout_secs),
        )
        .context("invalid [smtp] configuration")?;
        channels.push(Box::new(channel));
        tracing::info!(host = %config.smtp.host, "Email channel enabled");
    }

    if config.sms.enabled {
        let channel = SmsChannel::new(
            &config.sms.gateway_url,
            config.sms.api_key.as_deref().unwrap_or_default(),
            Duration::from_secs(config.sms.timeout_secs),
        )
        .context("invalid [sms] configuration")?;
        channels.push(Box::new(channel));
        tracing::info!(gateway = %config.sms.gateway_url, "SMS channel enabled");
    }

    if config.webhook.enabled {
        let channel = WebhookChannel::new(Duration::from_secs(config.webhook.timeout_secs))
            .context("invalid [webhook] configuration")?;
        channels.push(Box::new(channel));
        tracing::info!("Webhook channel enabled");
    }

    Ok(Dispatcher::new(
        channels,
        Duration::from_secs(config.delivery.send_timeout_secs),
    ))
}
