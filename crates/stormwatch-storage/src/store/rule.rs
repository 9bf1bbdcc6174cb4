use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use std::str::FromStr;
use stormwatch_common::types::{AlertRule, AlertType};

use crate::entities::alert_delivery::{Column as DeliveryCol, Entity as DeliveryEntity};
use crate::entities::alert_rule::{self, Column as RuleCol, Entity as RuleEntity};
use crate::error::{Result, StorageError};
use crate::store::AlertStore;

/// 规则列表过滤条件
#[derive(Debug, Clone, Default)]
pub struct AlertRuleFilter {
    pub user_id: Option<String>,
    pub alert_type_eq: Option<AlertType>,
    pub is_active_eq: Option<bool>,
    pub name_contains: Option<String>,
}

fn model_to_rule(m: alert_rule::Model) -> Result<AlertRule> {
    let alert_type = AlertType::from_str(&m.alert_type).map_err(|_| StorageError::Corrupt {
        column: "alert_type",
        value: m.alert_type.clone(),
    })?;
    Ok(AlertRule {
        id: m.id,
        user_id: m.user_id,
        name: m.name,
        description: m.description,
        alert_type,
        conditions: serde_json::from_str(&m.conditions)?,
        states: serde_json::from_str(&m.states)?,
        notification_methods: serde_json::from_str(&m.notification_methods)?,
        webhook_url: m.webhook_url,
        cooldown_minutes: m.cooldown_minutes.max(0) as u32,
        max_alerts_per_day: m.max_alerts_per_day.max(0) as u32,
        is_active: m.is_active,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn rule_to_active(rule: &AlertRule) -> Result<alert_rule::ActiveModel> {
    Ok(alert_rule::ActiveModel {
        id: Set(rule.id.clone()),
        user_id: Set(rule.user_id.clone()),
        name: Set(rule.name.clone()),
        description: Set(rule.description.clone()),
        alert_type: Set(rule.alert_type.to_string()),
        conditions: Set(serde_json::to_string(&rule.conditions)?),
        states: Set(serde_json::to_string(&rule.states)?),
        notification_methods: Set(serde_json::to_string(&rule.notification_methods)?),
        webhook_url: Set(rule.webhook_url.clone()),
        cooldown_minutes: Set(rule.cooldown_minutes as i32),
        max_alerts_per_day: Set(rule.max_alerts_per_day as i32),
        is_active: Set(rule.is_active),
        created_at: Set(rule.created_at.fixed_offset()),
        updated_at: Set(rule.updated_at.fixed_offset()),
    })
}

fn apply_filter(
    mut q: sea_orm::Select<RuleEntity>,
    filter: &AlertRuleFilter,
) -> sea_orm::Select<RuleEntity> {
    if let Some(ref uid) = filter.user_id {
        q = q.filter(RuleCol::UserId.eq(uid.as_str()));
    }
    if let Some(at) = filter.alert_type_eq {
        q = q.filter(RuleCol::AlertType.eq(at.to_string()));
    }
    if let Some(active) = filter.is_active_eq {
        q = q.filter(RuleCol::IsActive.eq(active));
    }
    if let Some(ref s) = filter.name_contains {
        q = q.filter(RuleCol::Name.contains(s.as_str()));
    }
    q
}

impl AlertStore {
    pub async fn insert_rule(&self, rule: &AlertRule) -> Result<AlertRule> {
        let am = rule_to_active(rule)?;
        let model = am.insert(self.db()).await?;
        model_to_rule(model)
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        let model = RuleEntity::find_by_id(id).one(self.db()).await?;
        model.map(model_to_rule).transpose()
    }

    pub async fn list_rules(
        &self,
        filter: &AlertRuleFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AlertRule>> {
        let rows = apply_filter(RuleEntity::find(), filter)
            .order_by(RuleCol::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        rows.into_iter().map(model_to_rule).collect()
    }

    pub async fn count_rules(&self, filter: &AlertRuleFilter) -> Result<u64> {
        Ok(apply_filter(RuleEntity::find(), filter)
            .count(self.db())
            .await?)
    }

    /// Active rules subscribed to `alert_type`, evaluated on every
    /// ingested event batch.
    pub async fn list_active_rules_by_type(&self, alert_type: AlertType) -> Result<Vec<AlertRule>> {
        let rows = RuleEntity::find()
            .filter(RuleCol::AlertType.eq(alert_type.to_string()))
            .filter(RuleCol::IsActive.eq(true))
            .order_by(RuleCol::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(model_to_rule).collect()
    }

    /// Whether `user_id` already has a rule named `name`, excluding
    /// `exclude_id` (for updates).
    pub async fn rule_name_taken(
        &self,
        user_id: &str,
        name: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        let mut q = RuleEntity::find()
            .filter(RuleCol::UserId.eq(user_id))
            .filter(RuleCol::Name.eq(name));
        if let Some(id) = exclude_id {
            q = q.filter(RuleCol::Id.ne(id));
        }
        Ok(q.count(self.db()).await? > 0)
    }

    /// Full-document replace; returns `None` when the rule is gone.
    pub async fn update_rule(&self, rule: &AlertRule) -> Result<Option<AlertRule>> {
        if RuleEntity::find_by_id(&rule.id).one(self.db()).await?.is_none() {
            return Ok(None);
        }
        let mut am = rule_to_active(rule)?;
        am.created_at = sea_orm::ActiveValue::NotSet;
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(model_to_rule(updated)?))
    }

    /// Deletes the rule and its delivery history in one transaction.
    pub async fn delete_rule(&self, id: &str) -> Result<bool> {
        let txn = self.db().begin().await?;
        DeliveryEntity::delete_many()
            .filter(DeliveryCol::RuleId.eq(id))
            .exec(&txn)
            .await?;
        let res = RuleEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        Ok(res.rows_affected > 0)
    }
}
