use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "alert_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub alert_type: String,
    /// JSON 数组：`RuleCondition` 列表
    pub conditions: String,
    /// JSON 数组：两位州/地区代码
    pub states: String,
    /// JSON 数组：通知渠道
    pub notification_methods: String,
    pub webhook_url: Option<String>,
    pub cooldown_minutes: i32,
    pub max_alerts_per_day: i32,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
