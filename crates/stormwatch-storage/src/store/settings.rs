use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use stormwatch_common::types::NotificationSettings;

use crate::entities::notification_settings::{self, Entity as SettingsEntity};
use crate::error::Result;
use crate::store::AlertStore;

fn model_to_settings(m: notification_settings::Model) -> NotificationSettings {
    NotificationSettings {
        user_id: m.user_id,
        email: m.email,
        phone_number: m.phone_number,
        email_enabled: m.email_enabled,
        sms_enabled: m.sms_enabled,
        webhook_enabled: m.webhook_enabled,
        quiet_hours_enabled: m.quiet_hours_enabled,
        quiet_hours_start: m.quiet_hours_start,
        quiet_hours_end: m.quiet_hours_end,
        timezone: m.timezone,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl AlertStore {
    pub async fn get_settings(&self, user_id: &str) -> Result<Option<NotificationSettings>> {
        let model = SettingsEntity::find_by_id(user_id).one(self.db()).await?;
        Ok(model.map(model_to_settings))
    }

    /// Settings for `user_id`, falling back to the conservative defaults
    /// (all channels off) without persisting them.
    pub async fn get_settings_or_default(&self, user_id: &str) -> Result<NotificationSettings> {
        Ok(self
            .get_settings(user_id)
            .await?
            .unwrap_or_else(|| NotificationSettings::defaults_for(user_id)))
    }

    /// Creates or fully replaces the settings row for `s.user_id`.
    pub async fn upsert_settings(&self, s: &NotificationSettings) -> Result<NotificationSettings> {
        let now = Utc::now().fixed_offset();
        let existing = SettingsEntity::find_by_id(&s.user_id).one(self.db()).await?;

        let model = match existing {
            Some(m) => {
                let mut am: notification_settings::ActiveModel = m.into();
                am.email = Set(s.email.clone());
                am.phone_number = Set(s.phone_number.clone());
                am.email_enabled = Set(s.email_enabled);
                am.sms_enabled = Set(s.sms_enabled);
                am.webhook_enabled = Set(s.webhook_enabled);
                am.quiet_hours_enabled = Set(s.quiet_hours_enabled);
                am.quiet_hours_start = Set(s.quiet_hours_start.clone());
                am.quiet_hours_end = Set(s.quiet_hours_end.clone());
                am.timezone = Set(s.timezone.clone());
                am.updated_at = Set(now);
                am.update(self.db()).await?
            }
            None => {
                let am = notification_settings::ActiveModel {
                    user_id: Set(s.user_id.clone()),
                    email: Set(s.email.clone()),
                    phone_number: Set(s.phone_number.clone()),
                    email_enabled: Set(s.email_enabled),
                    sms_enabled: Set(s.sms_enabled),
                    webhook_enabled: Set(s.webhook_enabled),
                    quiet_hours_enabled: Set(s.quiet_hours_enabled),
                    quiet_hours_start: Set(s.quiet_hours_start.clone()),
                    quiet_hours_end: Set(s.quiet_hours_end.clone()),
                    timezone: Set(s.timezone.clone()),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                am.insert(self.db()).await?
            }
        };
        Ok(model_to_settings(model))
    }
}
