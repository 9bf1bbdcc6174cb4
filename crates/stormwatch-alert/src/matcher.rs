use serde_json::Value;
use stormwatch_common::types::{allowed_fields, AlertRule, AlertType, ConditionOp, Event, RuleCondition};

/// Evaluates `event` against every rule in `rules` and returns the IDs of
/// the ones that match, in input order.
pub fn matching_rule_ids(event: &Event, rules: &[AlertRule]) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule_matches(rule, event))
        .map(|rule| rule.id.clone())
        .collect()
}

/// A rule matches when it is active, subscribes to the event's type, passes
/// the geographic filter, and every condition holds. An empty condition
/// list always passes the condition stage.
pub fn rule_matches(rule: &AlertRule, event: &Event) -> bool {
    if !rule.is_active || rule.alert_type != event.event_type {
        return false;
    }
    if !region_matches(&rule.states, event.state.as_deref()) {
        return false;
    }
    rule.conditions
        .iter()
        .all(|cond| condition_matches(rule.alert_type, cond, event))
}

/// Empty `states` means "all regions". Otherwise the event must carry a
/// region tag that is a member of the set (case-insensitive).
fn region_matches(states: &[String], event_state: Option<&str>) -> bool {
    if states.is_empty() {
        return true;
    }
    match event_state {
        Some(tag) => states.iter().any(|s| s.eq_ignore_ascii_case(tag)),
        None => false,
    }
}

fn condition_matches(alert_type: AlertType, cond: &RuleCondition, event: &Event) -> bool {
    // Fields outside the allow-list fail closed, same as at save time;
    // a malformed rule must never produce false positives.
    if !allowed_fields(alert_type).contains(&cond.field.as_str()) {
        tracing::debug!(field = %cond.field, %alert_type, "condition references disallowed field");
        return false;
    }
    let Some(actual) = event.field_value(&cond.field) else {
        return false;
    };
    match cond.operator {
        ConditionOp::Equals => value_text(&actual) == value_text(&cond.value),
        ConditionOp::Contains => value_text(&actual)
            .to_lowercase()
            .contains(&value_text(&cond.value).to_lowercase()),
        ConditionOp::GreaterThan => match (as_number(&actual), as_number(&cond.value)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        ConditionOp::LessThan => match (as_number(&actual), as_number(&cond.value)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
    }
}

/// Stringified form used by `equals` (case-sensitive) and `contains`
/// (case-insensitive). Strings compare by content, everything else by its
/// JSON rendering.
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric coercion for the ordering operators. Non-numeric operands make
/// the condition fail rather than error.
fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
