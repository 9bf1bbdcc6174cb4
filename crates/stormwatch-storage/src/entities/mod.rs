pub mod alert_delivery;
pub mod alert_rule;
pub mod notification_settings;
