use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Mutex;
use stormwatch_common::types::AlertRule;

/// Outcome of asking the tracker whether a matched rule may fire now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    Allowed,
    /// Still inside the cooldown window from the previous firing.
    InCooldown { retry_after_secs: i64 },
    /// The rolling-day cap is exhausted until the next local midnight.
    DailyCapReached { cap: u32 },
}

impl FireDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, FireDecision::Allowed)
    }
}

impl std::fmt::Display for FireDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FireDecision::Allowed => write!(f, "allowed"),
            FireDecision::InCooldown { retry_after_secs } => {
                write!(f, "in cooldown for another {retry_after_secs}s")
            }
            FireDecision::DailyCapReached { cap } => {
                write!(f, "daily cap of {cap} alerts reached")
            }
        }
    }
}

#[derive(Debug, Clone)]
struct FiringState {
    last_fired_at: Option<DateTime<Utc>>,
    fired_today: u32,
    day_start: NaiveDate,
}

/// Per-rule firing state: last-fired timestamp and a counter over the
/// owner's local day.
///
/// The whole map sits behind one mutex, so the read-check-increment for a
/// rule is atomic with respect to concurrent evaluations of the same rule.
/// State is in-process only; a multi-instance deployment would need to move
/// this into the store with a conditional update.
pub struct CooldownTracker {
    states: Mutex<HashMap<String, FiringState>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Checks the cooldown and daily cap for `rule` and, when allowed,
    /// records the firing in the same critical section. The day window
    /// resets at midnight in `tz` (the rule owner's timezone).
    pub fn check_and_mark(&self, rule: &AlertRule, now: DateTime<Utc>, tz: Tz) -> FireDecision {
        let today = now.with_timezone(&tz).date_naive();
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = states.entry(rule.id.clone()).or_insert_with(|| FiringState {
            last_fired_at: None,
            fired_today: 0,
            day_start: today,
        });

        if state.day_start != today {
            state.fired_today = 0;
            state.day_start = today;
        }

        if state.fired_today >= rule.max_alerts_per_day {
            return FireDecision::DailyCapReached {
                cap: rule.max_alerts_per_day,
            };
        }

        if let Some(last) = state.last_fired_at {
            let cooldown = Duration::minutes(i64::from(rule.cooldown_minutes));
            let elapsed = now - last;
            if elapsed < cooldown {
                return FireDecision::InCooldown {
                    retry_after_secs: (cooldown - elapsed).num_seconds(),
                };
            }
        }

        state.fired_today += 1;
        state.last_fired_at = Some(now);
        FireDecision::Allowed
    }

    /// Drops tracked state for a deleted rule.
    pub fn forget(&self, rule_id: &str) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        states.remove(rule_id);
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}
