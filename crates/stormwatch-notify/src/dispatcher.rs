use crate::{Notification, NotificationChannel};
use chrono::{DateTime, NaiveTime, Utc};
use std::time::Duration;
use stormwatch_common::types::{
    AlertRule, DeliveryStatus, NotificationMethod, NotificationSettings, Severity,
};

/// A user's quiet-hours window in their local timezone.
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    /// Parses the window from settings; `None` when quiet hours are
    /// disabled or the stored times are unparseable (fail-open: a broken
    /// window must not silently eat alerts).
    pub fn from_settings(settings: &NotificationSettings) -> Option<Self> {
        if !settings.quiet_hours_enabled {
            return None;
        }
        let start = NaiveTime::parse_from_str(&settings.quiet_hours_start, "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(&settings.quiet_hours_end, "%H:%M").ok()?;
        Some(Self { start, end })
    }

    /// Half-open `[start, end)` containment, wrapping past midnight when
    /// `start > end` (e.g. 22:00-07:00).
    pub fn contains(&self, local: NaiveTime) -> bool {
        if self.start <= self.end {
            local >= self.start && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }
}

/// Whether a firing of `severity` at `now` must be suppressed by the
/// user's quiet hours. `critical` always passes.
pub fn suppressed_by_quiet_hours(
    settings: &NotificationSettings,
    severity: Severity,
    now: DateTime<Utc>,
) -> bool {
    if severity >= Severity::Critical {
        return false;
    }
    let Some(window) = QuietHours::from_settings(settings) else {
        return false;
    };
    let local = now.with_timezone(&settings.tz()).time();
    window.contains(local)
}

/// Outcome of one channel delivery attempt.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub method: NotificationMethod,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
}

impl ChannelOutcome {
    fn failed(method: NotificationMethod, reason: impl Into<String>) -> Self {
        Self {
            method,
            status: DeliveryStatus::Failed,
            error_message: Some(reason.into()),
        }
    }

    fn sent(method: NotificationMethod) -> Self {
        Self {
            method,
            status: DeliveryStatus::Sent,
            error_message: None,
        }
    }
}

/// Result of the dry-run "Test" entry point.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub would_trigger: bool,
    pub message: String,
}

/// Routes firings to the configured channels, resolving recipients and
/// bounding every send with a timeout. Holds one channel per method; a
/// method without a registered channel (e.g. SMTP not configured on this
/// server) fails deliveries with an explanatory message.
pub struct Dispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>, send_timeout: Duration) -> Self {
        Self {
            channels,
            send_timeout,
        }
    }

    fn channel(&self, method: NotificationMethod) -> Option<&dyn NotificationChannel> {
        self.channels
            .iter()
            .find(|c| c.method() == method)
            .map(|c| c.as_ref())
    }

    /// The settings toggle for `method`.
    fn channel_enabled(settings: &NotificationSettings, method: NotificationMethod) -> bool {
        match method {
            NotificationMethod::Email => settings.email_enabled,
            NotificationMethod::Sms => settings.sms_enabled,
            NotificationMethod::Webhook => settings.webhook_enabled,
        }
    }

    /// Recipient for `method`: contact info from settings for email/SMS,
    /// the rule's own URL for webhooks.
    fn recipient_for(
        rule: &AlertRule,
        settings: &NotificationSettings,
        method: NotificationMethod,
    ) -> Result<String, &'static str> {
        let value = match method {
            NotificationMethod::Email => settings.email.clone(),
            NotificationMethod::Sms => settings.phone_number.clone(),
            NotificationMethod::Webhook => rule.webhook_url.clone(),
        };
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => Ok(v),
            None => Err(match method {
                NotificationMethod::Email => "no email address configured",
                NotificationMethod::Sms => "no phone number configured",
                NotificationMethod::Webhook => "rule has no webhook URL",
            }),
        }
    }

    /// Attempts delivery of `note` through one method. Settings toggles,
    /// missing contact info and unregistered channels short-circuit to a
    /// `failed` outcome without touching the network.
    pub async fn deliver(
        &self,
        method: NotificationMethod,
        rule: &AlertRule,
        note: &Notification,
        settings: &NotificationSettings,
    ) -> ChannelOutcome {
        if !Self::channel_enabled(settings, method) {
            return ChannelOutcome::failed(method, "channel disabled");
        }
        let recipient = match Self::recipient_for(rule, settings, method) {
            Ok(r) => r,
            Err(reason) => return ChannelOutcome::failed(method, reason),
        };
        let Some(channel) = self.channel(method) else {
            return ChannelOutcome::failed(method, format!("{method} channel not configured on this server"));
        };

        match tokio::time::timeout(self.send_timeout, channel.send(note, &recipient)).await {
            Ok(Ok(())) => {
                tracing::info!(rule_id = %rule.id, %method, "Notification delivered");
                ChannelOutcome::sent(method)
            }
            Ok(Err(e)) => ChannelOutcome::failed(method, e.to_string()),
            Err(_) => ChannelOutcome::failed(
                method,
                format!("delivery timed out after {}s", self.send_timeout.as_secs()),
            ),
        }
    }

    /// Dry run for the UI's "Test" button: bypasses cooldown and daily
    /// caps, applies the quiet-hours and settings checks, sends nothing.
    pub fn preview(
        &self,
        rule: &AlertRule,
        settings: &NotificationSettings,
        now: DateTime<Utc>,
    ) -> TestOutcome {
        if !rule.is_active {
            return TestOutcome {
                would_trigger: false,
                message: "rule is disabled".to_string(),
            };
        }

        // A test alert is non-critical, so quiet hours apply to it.
        if suppressed_by_quiet_hours(settings, Severity::High, now) {
            return TestOutcome {
                would_trigger: false,
                message: format!(
                    "quiet hours are active ({}-{} {}); a non-critical alert would be suppressed",
                    settings.quiet_hours_start, settings.quiet_hours_end, settings.timezone
                ),
            };
        }

        let mut deliverable = Vec::new();
        let mut blocked = Vec::new();
        for &method in &rule.notification_methods {
            if !Self::channel_enabled(settings, method) {
                blocked.push(format!("{method}: channel disabled"));
            } else if let Err(reason) = Self::recipient_for(rule, settings, method) {
                blocked.push(format!("{method}: {reason}"));
            } else if self.channel(method).is_none() {
                blocked.push(format!("{method}: channel not configured on this server"));
            } else {
                deliverable.push(method.to_string());
            }
        }

        if deliverable.is_empty() {
            TestOutcome {
                would_trigger: false,
                message: format!("no channel can deliver: {}", blocked.join("; ")),
            }
        } else {
            let mut message = format!("would deliver via {}", deliverable.join(", "));
            if !blocked.is_empty() {
                message.push_str(&format!(" (skipped: {})", blocked.join("; ")));
            }
            TestOutcome {
                would_trigger: true,
                message,
            }
        }
    }
}
