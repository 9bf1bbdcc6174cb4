use sea_orm::entity::prelude::*;

// No Eq: latitude/longitude are floats.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alert_deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub rule_id: String,
    /// 冗余存储，避免历史查询联表
    pub user_id: String,
    pub rule_name: String,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notification_method: String,
    pub status: String,
    pub error_message: Option<String>,
    /// 触发事件的原始 JSON
    pub source_data: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub sent_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
