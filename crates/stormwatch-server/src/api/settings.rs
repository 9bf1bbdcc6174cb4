use crate::api::{error_response, storage_error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stormwatch_common::types::NotificationSettings;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// 设置查询条件
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SettingsQuery {
    /// 用户 ID（缺省为服务器默认用户）
    #[serde(default)]
    pub user_id: Option<String>,
}

/// 保存通知设置请求体
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaveSettingsRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email_enabled: bool,
    #[serde(default)]
    pub sms_enabled: bool,
    #[serde(default)]
    pub webhook_enabled: bool,
    #[serde(default)]
    pub quiet_hours_enabled: bool,
    #[serde(default = "default_quiet_start")]
    pub quiet_hours_start: String,
    #[serde(default = "default_quiet_end")]
    pub quiet_hours_end: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_quiet_start() -> String {
    "22:00".to_string()
}

fn default_quiet_end() -> String {
    "07:00".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// 通知设置响应（含非致命的完整性提示）
#[derive(Serialize, ToSchema)]
struct SettingsResponse {
    #[serde(flatten)]
    settings: NotificationSettings,
    /// 已启用渠道缺少联系方式时的提示，不阻塞保存
    warnings: Vec<String>,
}

impl From<NotificationSettings> for SettingsResponse {
    fn from(settings: NotificationSettings) -> Self {
        Self {
            warnings: settings.completeness_warnings(),
            settings,
        }
    }
}

/// 查询用户通知设置；未保存过时返回默认值。
#[utoipa::path(
    get,
    path = "/api/alerts/settings",
    tag = "Settings",
    params(SettingsQuery),
    responses(
        (status = 200, description = "通知设置", body = SettingsResponse)
    )
)]
async fn get_settings(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> impl IntoResponse {
    let user_id = query
        .user_id
        .unwrap_or_else(|| state.config.default_user_id.clone());
    match state.store.get_settings_or_default(&user_id).await {
        Ok(settings) => {
            success_response(StatusCode::OK, &trace_id, SettingsResponse::from(settings))
        }
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// 保存用户通知设置（全量替换）。
#[utoipa::path(
    put,
    path = "/api/alerts/settings",
    tag = "Settings",
    request_body = SaveSettingsRequest,
    responses(
        (status = 200, description = "保存后的设置", body = SettingsResponse),
        (status = 400, description = "校验失败", body = crate::api::ApiError)
    )
)]
async fn put_settings(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<SaveSettingsRequest>,
) -> impl IntoResponse {
    let user_id = req
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| state.config.default_user_id.clone());
    let now = Utc::now();
    let settings = NotificationSettings {
        user_id,
        email: req.email.filter(|s| !s.trim().is_empty()),
        phone_number: req.phone_number.filter(|s| !s.trim().is_empty()),
        email_enabled: req.email_enabled,
        sms_enabled: req.sms_enabled,
        webhook_enabled: req.webhook_enabled,
        quiet_hours_enabled: req.quiet_hours_enabled,
        quiet_hours_start: req.quiet_hours_start,
        quiet_hours_end: req.quiet_hours_end,
        timezone: req.timezone,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = settings.validate() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "validation_error",
            &e.to_string(),
        );
    }
    for warning in settings.completeness_warnings() {
        tracing::warn!(user_id = %settings.user_id, %warning, "Settings saved with gap");
    }

    match state.store.upsert_settings(&settings).await {
        Ok(saved) => success_response(StatusCode::OK, &trace_id, SettingsResponse::from(saved)),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn settings_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(get_settings, put_settings))
}
