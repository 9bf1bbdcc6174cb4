//! Rule evaluation for the stormwatch alerting pipeline.
//!
//! [`matcher`] decides which active rules an incoming event satisfies
//! (type filter, geographic filter, AND-combined field conditions).
//! [`limiter`] decides whether a matched rule is allowed to fire again,
//! enforcing the per-rule cooldown and the rolling daily cap.

pub mod limiter;
pub mod matcher;


pub use limiter::{CooldownTracker, FireDecision};
pub use matcher::{matching_rule_ids, rule_matches};
