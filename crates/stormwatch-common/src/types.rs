use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Event severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use stormwatch_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Category of disaster event a rule subscribes to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Weather,
    Wildfire,
    Earthquake,
    Disaster,
    AirQuality,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Weather => write!(f, "weather"),
            AlertType::Wildfire => write!(f, "wildfire"),
            AlertType::Earthquake => write!(f, "earthquake"),
            AlertType::Disaster => write!(f, "disaster"),
            AlertType::AirQuality => write!(f, "air_quality"),
        }
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weather" => Ok(AlertType::Weather),
            "wildfire" => Ok(AlertType::Wildfire),
            "earthquake" => Ok(AlertType::Earthquake),
            "disaster" => Ok(AlertType::Disaster),
            "air_quality" => Ok(AlertType::AirQuality),
            _ => Err(format!("unknown alert type: {s}")),
        }
    }
}

/// Delivery channel for a fired rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    Email,
    Sms,
    Webhook,
}

impl std::fmt::Display for NotificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationMethod::Email => write!(f, "email"),
            NotificationMethod::Sms => write!(f, "sms"),
            NotificationMethod::Webhook => write!(f, "webhook"),
        }
    }
}

impl std::str::FromStr for NotificationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(NotificationMethod::Email),
            "sms" => Ok(NotificationMethod::Sms),
            "webhook" => Ok(NotificationMethod::Webhook),
            _ => Err(format!("unknown notification method: {s}")),
        }
    }
}

/// Lifecycle state of one delivery attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("unknown delivery status: {s}")),
        }
    }
}

/// Comparison operator in a rule condition.
///
/// # Examples
///
/// ```
/// use stormwatch_common::types::ConditionOp;
///
/// let op: ConditionOp = "greater_than".parse().unwrap();
/// assert_eq!(op.to_string(), "greater_than");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
}

impl std::str::FromStr for ConditionOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" | "eq" => Ok(Self::Equals),
            "contains" => Ok(Self::Contains),
            "greater_than" | "gt" => Ok(Self::GreaterThan),
            "less_than" | "lt" => Ok(Self::LessThan),
            _ => Err(format!("unknown condition operator: {s}")),
        }
    }
}

impl std::fmt::Display for ConditionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equals => write!(f, "equals"),
            Self::Contains => write!(f, "contains"),
            Self::GreaterThan => write!(f, "greater_than"),
            Self::LessThan => write!(f, "less_than"),
        }
    }
}

/// One field condition of an alert rule. All conditions in a rule must hold
/// (logical AND) for the rule to match an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RuleCondition {
    /// Event field name, checked against [`allowed_fields`] for the rule's type.
    pub field: String,
    /// 比较运算符
    pub operator: ConditionOp,
    /// 比较值（字符串或数值）
    #[schema(value_type = Object)]
    pub value: Value,
}

/// Event fields a condition may reference, per alert type.
///
/// Conditions naming any other field are rejected at save time, and fail
/// closed (non-match) if such a rule reaches the matcher anyway.
pub fn allowed_fields(alert_type: AlertType) -> &'static [&'static str] {
    match alert_type {
        AlertType::Weather => &[
            "severity", "title", "description", "location", "state", "event", "headline",
            "urgency", "certainty", "area",
        ],
        AlertType::Wildfire => &[
            "severity", "title", "description", "location", "state", "acres_burned",
            "containment_percent",
        ],
        AlertType::Earthquake => &[
            "severity", "title", "description", "location", "state", "magnitude", "depth_km",
        ],
        AlertType::Disaster => &[
            "severity", "title", "description", "location", "state", "declaration_type",
            "incident_type",
        ],
        AlertType::AirQuality => &[
            "severity", "title", "description", "location", "state", "aqi", "pollutant",
        ],
    }
}

/// 告警规则（用户定义的过滤 + 通知配置）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AlertRule {
    /// 规则唯一标识
    pub id: String,
    /// 所属用户 ID
    pub user_id: String,
    /// 规则名称
    pub name: String,
    /// 描述信息（可选）
    pub description: Option<String>,
    /// 订阅的事件类型
    pub alert_type: AlertType,
    /// 字段条件列表（AND 组合）
    pub conditions: Vec<RuleCondition>,
    /// 地理过滤：两位州/地区代码集合，空表示全部地区
    pub states: Vec<String>,
    /// 通知渠道（非空）
    pub notification_methods: Vec<NotificationMethod>,
    /// Webhook 地址（仅当渠道包含 webhook 时必填）
    pub webhook_url: Option<String>,
    /// 冷却时间（分钟，1-1440）
    pub cooldown_minutes: u32,
    /// 每日触发上限（1-100）
    pub max_alerts_per_day: u32,
    /// 是否启用
    pub is_active: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// Rejection reasons for a rule definition, surfaced at save time.
#[derive(Debug, thiserror::Error)]
pub enum RuleValidationError {
    #[error("rule name must not be empty")]
    EmptyName,

    #[error("at least one notification method is required")]
    EmptyNotificationMethods,

    #[error("cooldown_minutes must be between 1 and 1440, got {0}")]
    CooldownOutOfRange(u32),

    #[error("max_alerts_per_day must be between 1 and 100, got {0}")]
    DailyCapOutOfRange(u32),

    #[error("webhook_url is required when the webhook method is selected")]
    MissingWebhookUrl,

    #[error("webhook_url is not a valid http(s) URL: {0}")]
    InvalidWebhookUrl(String),

    #[error("field '{field}' is not usable in conditions for alert type '{alert_type}'")]
    UnknownConditionField {
        field: String,
        alert_type: AlertType,
    },

    #[error("'{0}' is not a two-letter region code")]
    InvalidStateCode(String),
}

impl AlertRule {
    /// Validates the rule definition. Invalid rules are rejected before they
    /// are persisted, so the matcher only ever sees well-formed rules.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.name.trim().is_empty() {
            return Err(RuleValidationError::EmptyName);
        }
        if self.notification_methods.is_empty() {
            return Err(RuleValidationError::EmptyNotificationMethods);
        }
        if !(1..=1440).contains(&self.cooldown_minutes) {
            return Err(RuleValidationError::CooldownOutOfRange(
                self.cooldown_minutes,
            ));
        }
        if !(1..=100).contains(&self.max_alerts_per_day) {
            return Err(RuleValidationError::DailyCapOutOfRange(
                self.max_alerts_per_day,
            ));
        }
        if self
            .notification_methods
            .contains(&NotificationMethod::Webhook)
        {
            let raw = self
                .webhook_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or(RuleValidationError::MissingWebhookUrl)?;
            match url::Url::parse(raw) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
                _ => return Err(RuleValidationError::InvalidWebhookUrl(raw.to_string())),
            }
        }
        for cond in &self.conditions {
            if !allowed_fields(self.alert_type).contains(&cond.field.as_str()) {
                return Err(RuleValidationError::UnknownConditionField {
                    field: cond.field.clone(),
                    alert_type: self.alert_type,
                });
            }
        }
        for state in &self.states {
            if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(RuleValidationError::InvalidStateCode(state.clone()));
            }
        }
        Ok(())
    }
}

/// Geographic point attached to an event or delivery record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Normalized event emitted by the external feed adapters (FEMA, NWS, NOAA
/// storm events, social monitor). Adapters map their raw payloads into this
/// shape before handing batches to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Event {
    /// 事件唯一标识（来源侧生成）
    pub id: String,
    /// 事件类型
    #[serde(rename = "type")]
    pub event_type: AlertType,
    /// 严重级别
    pub severity: Severity,
    /// 标题
    pub title: String,
    /// 两位州/地区代码（可选）
    pub state: Option<String>,
    /// 位置描述（可选）
    pub location: Option<String>,
    /// 经纬度（可选）
    pub coordinates: Option<Coordinates>,
    /// 原始归一化字段（条件匹配的取值来源）
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    /// 事件发生时间
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    /// Looks up a named field for condition evaluation. The raw `fields`
    /// map wins, so conditions see the feed's own values (e.g. an NWS
    /// severity of `"Severe"`); the normalized intrinsics (`severity`,
    /// `title`, `state`, `location`) act as fallbacks.
    pub fn field_value(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.fields.get(name) {
            return Some(v.clone());
        }
        match name {
            "severity" => Some(Value::String(self.severity.to_string())),
            "title" => Some(Value::String(self.title.clone())),
            "state" => self.state.clone().map(Value::String),
            "location" => self.location.clone().map(Value::String),
            _ => None,
        }
    }
}

/// 用户通知设置（每用户一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationSettings {
    /// 用户 ID
    pub user_id: String,
    /// 邮箱地址（可选）
    pub email: Option<String>,
    /// 手机号（可选，E.164 风格）
    pub phone_number: Option<String>,
    /// 是否启用邮件通知
    pub email_enabled: bool,
    /// 是否启用短信通知
    pub sms_enabled: bool,
    /// 是否启用 Webhook 通知
    pub webhook_enabled: bool,
    /// 是否启用免打扰时段
    pub quiet_hours_enabled: bool,
    /// 免打扰开始时间（本地 HH:MM）
    pub quiet_hours_start: String,
    /// 免打扰结束时间（本地 HH:MM）
    pub quiet_hours_end: String,
    /// IANA 时区名（如 America/Los_Angeles）
    pub timezone: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// Rejection reasons for notification settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsValidationError {
    #[error("'{0}' does not look like an email address")]
    InvalidEmail(String),

    #[error("'{0}' does not look like a phone number")]
    InvalidPhoneNumber(String),

    #[error("quiet hours time '{0}' is not in HH:MM format")]
    InvalidQuietHoursTime(String),

    #[error("'{0}' is not a known IANA timezone")]
    UnknownTimezone(String),
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn looks_like_phone(s: &str) -> bool {
    let digits = s.strip_prefix('+').unwrap_or(s);
    let digits: String = digits.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

impl NotificationSettings {
    /// Fresh settings for a user who has never saved any: all channels off,
    /// quiet hours disabled, UTC.
    pub fn defaults_for(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            email: None,
            phone_number: None,
            email_enabled: false,
            sms_enabled: false,
            webhook_enabled: false,
            quiet_hours_enabled: false,
            quiet_hours_start: "22:00".to_string(),
            quiet_hours_end: "07:00".to_string(),
            timezone: "UTC".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Hard validation applied at save time. Contact fields are optional but
    /// must be well-formed when present.
    pub fn validate(&self) -> Result<(), SettingsValidationError> {
        if let Some(email) = self.email.as_deref().filter(|s| !s.is_empty()) {
            if !looks_like_email(email) {
                return Err(SettingsValidationError::InvalidEmail(email.to_string()));
            }
        }
        if let Some(phone) = self.phone_number.as_deref().filter(|s| !s.is_empty()) {
            if !looks_like_phone(phone) {
                return Err(SettingsValidationError::InvalidPhoneNumber(
                    phone.to_string(),
                ));
            }
        }
        for time in [&self.quiet_hours_start, &self.quiet_hours_end] {
            if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
                return Err(SettingsValidationError::InvalidQuietHoursTime(time.clone()));
            }
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(SettingsValidationError::UnknownTimezone(
                self.timezone.clone(),
            ));
        }
        Ok(())
    }

    /// Soft completeness check: an enabled channel whose contact field is
    /// missing. Surfaced as warnings in API responses, never an error.
    pub fn completeness_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.email_enabled && self.email.as_deref().unwrap_or("").is_empty() {
            warnings.push("email notifications are enabled but no email address is set".into());
        }
        if self.sms_enabled && self.phone_number.as_deref().unwrap_or("").is_empty() {
            warnings.push("sms notifications are enabled but no phone number is set".into());
        }
        warnings
    }

    /// Owner timezone, falling back to UTC when unset or unknown.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::Tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_rule() -> AlertRule {
        let now = Utc::now();
        AlertRule {
            id: "r-1".into(),
            user_id: "default".into(),
            name: "Severe weather in CA".into(),
            description: None,
            alert_type: AlertType::Weather,
            conditions: vec![RuleCondition {
                field: "severity".into(),
                operator: ConditionOp::Equals,
                value: json!("Severe"),
            }],
            states: vec!["CA".into()],
            notification_methods: vec![NotificationMethod::Email],
            webhook_url: None,
            cooldown_minutes: 60,
            max_alerts_per_day: 5,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn valid_rule_passes() {
        assert!(base_rule().validate().is_ok());
    }

    #[test]
    fn webhook_method_without_url_fails() {
        let mut rule = base_rule();
        rule.notification_methods = vec![NotificationMethod::Email, NotificationMethod::Webhook];
        rule.webhook_url = None;
        assert!(matches!(
            rule.validate(),
            Err(RuleValidationError::MissingWebhookUrl)
        ));

        rule.webhook_url = Some("not a url".into());
        assert!(matches!(
            rule.validate(),
            Err(RuleValidationError::InvalidWebhookUrl(_))
        ));

        rule.webhook_url = Some("https://hooks.example.com/alerts".into());
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn empty_methods_rejected() {
        let mut rule = base_rule();
        rule.notification_methods.clear();
        assert!(matches!(
            rule.validate(),
            Err(RuleValidationError::EmptyNotificationMethods)
        ));
    }

    #[test]
    fn cooldown_and_cap_bounds_enforced() {
        let mut rule = base_rule();
        rule.cooldown_minutes = 0;
        assert!(rule.validate().is_err());
        rule.cooldown_minutes = 1441;
        assert!(rule.validate().is_err());
        rule.cooldown_minutes = 1440;
        assert!(rule.validate().is_ok());

        rule.max_alerts_per_day = 0;
        assert!(rule.validate().is_err());
        rule.max_alerts_per_day = 101;
        assert!(rule.validate().is_err());
        rule.max_alerts_per_day = 100;
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn condition_field_must_be_allowed() {
        let mut rule = base_rule();
        rule.conditions.push(RuleCondition {
            field: "magnitude".into(), // earthquake field, not weather
            operator: ConditionOp::GreaterThan,
            value: json!(5.0),
        });
        assert!(matches!(
            rule.validate(),
            Err(RuleValidationError::UnknownConditionField { .. })
        ));
    }

    #[test]
    fn state_codes_must_be_two_letters() {
        let mut rule = base_rule();
        rule.states = vec!["CAL".into()];
        assert!(rule.validate().is_err());
        rule.states = vec!["C1".into()];
        assert!(rule.validate().is_err());
        rule.states = vec!["CA".into(), "OR".into()];
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn settings_contact_validation() {
        let mut settings = NotificationSettings::defaults_for("default");
        assert!(settings.validate().is_ok());

        settings.email = Some("not-an-email".into());
        assert!(settings.validate().is_err());
        settings.email = Some("ops@example.com".into());
        assert!(settings.validate().is_ok());

        settings.phone_number = Some("call me".into());
        assert!(settings.validate().is_err());
        settings.phone_number = Some("+15551234567".into());
        assert!(settings.validate().is_ok());

        settings.timezone = "Mars/Olympus".into();
        assert!(settings.validate().is_err());
        settings.timezone = "America/New_York".into();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn completeness_warnings_for_enabled_channels() {
        let mut settings = NotificationSettings::defaults_for("default");
        settings.email_enabled = true;
        settings.sms_enabled = true;
        assert_eq!(settings.completeness_warnings().len(), 2);

        settings.email = Some("ops@example.com".into());
        assert_eq!(settings.completeness_warnings().len(), 1);
    }

    #[test]
    fn event_field_lookup_covers_intrinsics() {
        let event = Event {
            id: "e-1".into(),
            event_type: AlertType::Earthquake,
            severity: Severity::High,
            title: "M6.1 near Ridgecrest".into(),
            state: Some("CA".into()),
            location: Some("Ridgecrest, CA".into()),
            coordinates: None,
            fields: HashMap::from([("magnitude".to_string(), json!(6.1))]),
            occurred_at: Utc::now(),
        };
        assert_eq!(event.field_value("severity"), Some(json!("high")));
        assert_eq!(event.field_value("magnitude"), Some(json!(6.1)));
        assert_eq!(event.field_value("nonexistent"), None);
    }
}
