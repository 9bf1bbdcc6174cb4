//! Shared domain types for the stormwatch alerting pipeline.
//!
//! Defines the normalized [`types::Event`] shape produced by the external
//! disaster feeds, the user-facing [`types::AlertRule`] schema with its
//! save-time validation, and per-user [`types::NotificationSettings`].

pub mod id;
pub mod types;
