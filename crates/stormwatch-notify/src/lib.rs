//! Notification delivery for fired alert rules.
//!
//! One [`NotificationChannel`] implementation per delivery method (email
//! over SMTP, SMS through an HTTP gateway, plain webhooks). The
//! [`dispatcher::Dispatcher`] resolves recipients from the rule and the
//! user's settings, applies quiet hours, and bounds every send with a
//! timeout.

pub mod channels;
pub mod dispatcher;
pub mod error;


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use stormwatch_common::types::{
    AlertRule, AlertType, Coordinates, Event, NotificationMethod, Severity,
};

/// Channel-agnostic payload for one firing of a rule against an event.
#[derive(Debug, Clone)]
pub struct Notification {
    pub rule_id: String,
    pub rule_name: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub alert_type: AlertType,
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Raw triggering event payload, kept for the history log.
    pub source_data: Value,
    pub triggered_at: DateTime<Utc>,
}

impl Notification {
    /// Builds the payload for `rule` firing against `event`.
    pub fn for_firing(rule: &AlertRule, event: &Event) -> Self {
        let mut message = event.title.clone();
        if let Some(desc) = event
            .fields
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            message.push_str("\n\n");
            message.push_str(desc);
        }
        if let Some(location) = event.location.as_deref() {
            message.push_str(&format!("\nLocation: {location}"));
        }
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            title: format!("[{}] {}", rule.name, event.title),
            message,
            severity: event.severity,
            alert_type: event.event_type,
            location: event.location.clone(),
            coordinates: event.coordinates,
            source_data: serde_json::to_value(event).unwrap_or(Value::Null),
            triggered_at: event.occurred_at,
        }
    }
}

/// A delivery channel that pushes a [`Notification`] to one recipient
/// (an email address, a phone number, or a webhook URL).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the notification to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails after the channel's retries.
    async fn send(&self, note: &Notification, recipient: &str) -> error::Result<()>;

    /// The method this channel implements.
    fn method(&self) -> NotificationMethod;
}
