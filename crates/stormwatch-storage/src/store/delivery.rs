use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stormwatch_common::types::{
    AlertType, Coordinates, DeliveryStatus, NotificationMethod, Severity,
};

use crate::entities::alert_delivery::{self, Column as DeliveryCol, Entity as DeliveryEntity};
use crate::error::Result;
use crate::store::AlertStore;

/// 投递历史数据行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDeliveryRow {
    pub id: String,
    pub rule_id: String,
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
    /// 触发事件的原始 JSON 文本
    pub source_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// 待写入的投递记录（状态固定为 pending）
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub rule_id: String,
    pub user_id: String,
    pub rule_name: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub notification_method: NotificationMethod,
    pub source_data: Option<String>,
}

/// 投递历史过滤条件
#[derive(Debug, Clone, Default)]
pub struct DeliveryFilter {
    pub user_id: Option<String>,
    pub rule_id_eq: Option<String>,
    pub status_eq: Option<DeliveryStatus>,
    pub severity_eq: Option<Severity>,
    pub alert_type_eq: Option<AlertType>,
}

/// 投递历史统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySummary {
    pub total: u64,
    pub by_status: HashMap<String, u64>,
    pub by_severity: HashMap<String, u64>,
    pub by_method: HashMap<String, u64>,
}

fn model_to_row(m: alert_delivery::Model) -> AlertDeliveryRow {
    AlertDeliveryRow {
        id: m.id,
        rule_id: m.rule_id,
        user_id: m.user_id,
        rule_name: m.rule_name,
        alert_type: m.alert_type,
        severity: m.severity,
        title: m.title,
        message: m.message,
        location: m.location,
        latitude: m.latitude,
        longitude: m.longitude,
        notification_method: m.notification_method,
        status: m.status,
        error_message: m.error_message,
        source_data: m.source_data,
        created_at: m.created_at.with_timezone(&Utc),
        sent_at: m.sent_at.map(|t| t.with_timezone(&Utc)),
    }
}

fn apply_filter(
    mut q: sea_orm::Select<DeliveryEntity>,
    filter: &DeliveryFilter,
) -> sea_orm::Select<DeliveryEntity> {
    if let Some(ref uid) = filter.user_id {
        q = q.filter(DeliveryCol::UserId.eq(uid.as_str()));
    }
    if let Some(ref rid) = filter.rule_id_eq {
        q = q.filter(DeliveryCol::RuleId.eq(rid.as_str()));
    }
    if let Some(status) = filter.status_eq {
        q = q.filter(DeliveryCol::Status.eq(status.to_string()));
    }
    if let Some(sev) = filter.severity_eq {
        q = q.filter(DeliveryCol::Severity.eq(sev.to_string()));
    }
    if let Some(at) = filter.alert_type_eq {
        q = q.filter(DeliveryCol::AlertType.eq(at.to_string()));
    }
    q
}

impl AlertStore {
    /// Inserts a `pending` row before the send attempt, so an interrupted
    /// delivery still leaves a trace.
    pub async fn insert_pending_delivery(&self, new: &NewDelivery) -> Result<AlertDeliveryRow> {
        let id = stormwatch_common::id::next_id();
        let now = Utc::now().fixed_offset();
        let am = alert_delivery::ActiveModel {
            id: Set(id),
            rule_id: Set(new.rule_id.clone()),
            user_id: Set(new.user_id.clone()),
            rule_name: Set(new.rule_name.clone()),
            alert_type: Set(new.alert_type.to_string()),
            severity: Set(new.severity.to_string()),
            title: Set(new.title.clone()),
            message: Set(new.message.clone()),
            location: Set(new.location.clone()),
            latitude: Set(new.coordinates.map(|c| c.lat)),
            longitude: Set(new.coordinates.map(|c| c.lon)),
            notification_method: Set(new.notification_method.to_string()),
            status: Set(DeliveryStatus::Pending.to_string()),
            error_message: Set(None),
            source_data: Set(new.source_data.clone()),
            created_at: Set(now),
            sent_at: Set(None),
        };
        let model = am.insert(self.db()).await?;
        Ok(model_to_row(model))
    }

    /// Transitions one delivery row out of `pending`. `sent_at` is stamped
    /// only on success.
    pub async fn finish_delivery(
        &self,
        id: &str,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let sent_at = match status {
            DeliveryStatus::Sent => Some(Utc::now().fixed_offset()),
            _ => None,
        };
        DeliveryEntity::update_many()
            .col_expr(DeliveryCol::Status, Expr::value(status.to_string()))
            .col_expr(
                DeliveryCol::ErrorMessage,
                Expr::value(error_message.map(str::to_owned)),
            )
            .col_expr(DeliveryCol::SentAt, Expr::value(sent_at))
            .filter(DeliveryCol::Id.eq(id))
            .exec(self.db())
            .await?;
        Ok(())
    }

    pub async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AlertDeliveryRow>> {
        let rows = apply_filter(DeliveryEntity::find(), filter)
            .order_by(DeliveryCol::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(model_to_row).collect())
    }

    pub async fn count_deliveries(&self, filter: &DeliveryFilter) -> Result<u64> {
        Ok(apply_filter(DeliveryEntity::find(), filter)
            .count(self.db())
            .await?)
    }

    /// Counts by status, severity and method for one user's history.
    pub async fn delivery_summary(&self, user_id: &str) -> Result<DeliverySummary> {
        let base = || {
            DeliveryEntity::find().filter(DeliveryCol::UserId.eq(user_id))
        };
        let total = base().count(self.db()).await?;

        let mut by_status = HashMap::new();
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Sent,
            DeliveryStatus::Failed,
        ] {
            let n = base()
                .filter(DeliveryCol::Status.eq(status.to_string()))
                .count(self.db())
                .await?;
            if n > 0 {
                by_status.insert(status.to_string(), n);
            }
        }

        let mut by_severity = HashMap::new();
        for sev in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let n = base()
                .filter(DeliveryCol::Severity.eq(sev.to_string()))
                .count(self.db())
                .await?;
            if n > 0 {
                by_severity.insert(sev.to_string(), n);
            }
        }

        let mut by_method = HashMap::new();
        for method in [
            NotificationMethod::Email,
            NotificationMethod::Sms,
            NotificationMethod::Webhook,
        ] {
            let n = base()
                .filter(DeliveryCol::NotificationMethod.eq(method.to_string()))
                .count(self.db())
                .await?;
            if n > 0 {
                by_method.insert(method.to_string(), n);
            }
        }

        Ok(DeliverySummary {
            total,
            by_status,
            by_severity,
            by_method,
        })
    }

    /// Marks `pending` rows older than `grace` as `failed`. Run once at
    /// startup so deliveries interrupted by a crash don't stay `pending`
    /// forever.
    pub async fn reconcile_stale_pending(&self, grace: Duration) -> Result<u64> {
        let cutoff = (Utc::now() - grace).fixed_offset();
        let res = DeliveryEntity::update_many()
            .col_expr(
                DeliveryCol::Status,
                Expr::value(DeliveryStatus::Failed.to_string()),
            )
            .col_expr(
                DeliveryCol::ErrorMessage,
                Expr::value(Some("delivery interrupted by server restart".to_owned())),
            )
            .filter(DeliveryCol::Status.eq(DeliveryStatus::Pending.to_string()))
            .filter(DeliveryCol::CreatedAt.lt(cutoff))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    /// Deletes rows older than the retention window; returns the count.
    pub async fn purge_deliveries_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = (Utc::now() - Duration::days(i64::from(days))).fixed_offset();
        let res = DeliveryEntity::delete_many()
            .filter(DeliveryCol::CreatedAt.lt(cutoff))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
