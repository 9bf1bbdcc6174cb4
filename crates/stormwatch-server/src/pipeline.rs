//! Evaluates ingested event batches against stored rules and drives
//! deliveries through the dispatcher.
//!
//! Per-channel delivery rows follow a write-ahead pattern: a `pending`
//! row is inserted before the send and transitioned to `sent`/`failed`
//! afterwards, so a crash mid-send still leaves a trace.

use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use stormwatch_alert::limiter::FireDecision;
use stormwatch_alert::matcher;
use stormwatch_common::types::{AlertRule, Event};
use stormwatch_notify::dispatcher::suppressed_by_quiet_hours;
use stormwatch_notify::Notification;
use stormwatch_storage::store::NewDelivery;
use stormwatch_storage::error::Result as StorageResult;
use utoipa::ToSchema;

/// Counters for one processed batch.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct PipelineReport {
    /// 本批事件数
    pub events: usize,
    /// 规则命中次数（事件 × 规则）
    pub matched: usize,
    /// 实际触发投递的次数
    pub fired: usize,
    /// 被免打扰/冷却/每日上限拦截的次数
    pub suppressed: usize,
    /// 写入的投递记录条数
    pub deliveries: usize,
}

/// Runs the full match → rate-limit → deliver pipeline for a batch.
pub async fn process_batch(
    state: &AppState,
    events: &[Event],
    now: DateTime<Utc>,
) -> StorageResult<PipelineReport> {
    let mut report = PipelineReport {
        events: events.len(),
        ..Default::default()
    };

    for event in events {
        let rules = state.store.list_active_rules_by_type(event.event_type).await?;
        let matched_ids = matcher::matching_rule_ids(event, &rules);
        report.matched += matched_ids.len();

        for rule in rules.iter().filter(|r| matched_ids.contains(&r.id)) {
            process_firing(state, rule, event, now, &mut report).await?;
        }
    }

    tracing::info!(
        events = report.events,
        matched = report.matched,
        fired = report.fired,
        suppressed = report.suppressed,
        deliveries = report.deliveries,
        "Event batch processed"
    );
    Ok(report)
}

async fn process_firing(
    state: &AppState,
    rule: &AlertRule,
    event: &Event,
    now: DateTime<Utc>,
    report: &mut PipelineReport,
) -> StorageResult<()> {
    let settings = state.store.get_settings_or_default(&rule.user_id).await?;

    // Quiet hours come first: a suppressed firing must not consume the
    // cooldown or the daily cap.
    if suppressed_by_quiet_hours(&settings, event.severity, now) {
        tracing::debug!(rule_id = %rule.id, event_id = %event.id, "Suppressed by quiet hours");
        report.suppressed += 1;
        return Ok(());
    }

    match state.limiter.check_and_mark(rule, now, settings.tz()) {
        FireDecision::Allowed => {}
        decision => {
            tracing::debug!(
                rule_id = %rule.id,
                event_id = %event.id,
                decision = %decision,
                "Suppressed by rate limiter"
            );
            report.suppressed += 1;
            return Ok(());
        }
    }

    report.fired += 1;
    let note = Notification::for_firing(rule, event);
    let source_data = serde_json::to_string(event).ok();

    for &method in &rule.notification_methods {
        let pending = state
            .store
            .insert_pending_delivery(&NewDelivery {
                rule_id: rule.id.clone(),
                user_id: rule.user_id.clone(),
                rule_name: rule.name.clone(),
                alert_type: event.event_type,
                severity: event.severity,
                title: note.title.clone(),
                message: note.message.clone(),
                location: event.location.clone(),
                coordinates: event.coordinates,
                notification_method: method,
                source_data: source_data.clone(),
            })
            .await?;
        report.deliveries += 1;

        let outcome = state.dispatcher.deliver(method, rule, &note, &settings).await;
        state
            .store
            .finish_delivery(&pending.id, outcome.status, outcome.error_message.as_deref())
            .await?;
    }
    Ok(())
}
