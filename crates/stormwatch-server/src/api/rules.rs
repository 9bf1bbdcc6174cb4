use crate::api::pagination::PageQuery;
use crate::api::{
    error_response, storage_error_response, success_empty_response, success_paginated_response,
    success_response,
};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stormwatch_common::types::{AlertRule, AlertType, NotificationMethod, RuleCondition};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// 创建/更新规则请求体
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaveRuleRequest {
    /// 所属用户；缺省时使用服务器配置的默认用户
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub alert_type: AlertType,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    /// 两位州/地区代码；空集合匹配全部地区
    #[serde(default)]
    pub states: Vec<String>,
    pub notification_methods: Vec<NotificationMethod>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,
    #[serde(default = "default_max_alerts_per_day")]
    pub max_alerts_per_day: u32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_cooldown_minutes() -> u32 {
    60
}

fn default_max_alerts_per_day() -> u32 {
    10
}

fn default_is_active() -> bool {
    true
}

/// 规则列表查询条件
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RuleListQuery {
    /// 所属用户（缺省为全部用户）
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "alert_type__eq")]
    pub alert_type_eq: Option<AlertType>,
    #[serde(default, rename = "is_active__eq")]
    pub is_active_eq: Option<bool>,
    #[serde(default, rename = "name__contains")]
    pub name_contains: Option<String>,
}

impl SaveRuleRequest {
    fn into_rule(self, id: String, default_user: &str, created_at: chrono::DateTime<Utc>) -> AlertRule {
        let now = Utc::now();
        AlertRule {
            id,
            user_id: self
                .user_id
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| default_user.to_string()),
            name: self.name.trim().to_string(),
            description: self.description,
            alert_type: self.alert_type,
            conditions: self.conditions,
            states: self.states,
            notification_methods: self.notification_methods,
            webhook_url: self.webhook_url,
            cooldown_minutes: self.cooldown_minutes,
            max_alerts_per_day: self.max_alerts_per_day,
            is_active: self.is_active,
            created_at,
            updated_at: now,
        }
    }
}

/// 分页查询告警规则。
#[utoipa::path(
    get,
    path = "/api/alerts/rules",
    tag = "Rules",
    params(RuleListQuery, PageQuery),
    responses(
        (status = 200, description = "规则分页列表", body = Vec<AlertRule>)
    )
)]
async fn list_rules(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<RuleListQuery>,
    Query(pagination): Query<PageQuery>,
) -> impl IntoResponse {
    let filter = stormwatch_storage::store::AlertRuleFilter {
        user_id: query.user_id,
        alert_type_eq: query.alert_type_eq,
        is_active_eq: query.is_active_eq,
        name_contains: query.name_contains,
    };
    let limit = pagination.limit();
    let offset = pagination.offset();

    let total = match state.store.count_rules(&filter).await {
        Ok(v) => v,
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    match state.store.list_rules(&filter, limit, offset).await {
        Ok(rules) => {
            success_paginated_response(StatusCode::OK, &trace_id, rules, total, limit, offset)
        }
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// 创建告警规则。
#[utoipa::path(
    post,
    path = "/api/alerts/rules",
    tag = "Rules",
    request_body = SaveRuleRequest,
    responses(
        (status = 201, description = "创建成功", body = AlertRule),
        (status = 400, description = "校验失败", body = crate::api::ApiError),
        (status = 409, description = "同名规则已存在", body = crate::api::ApiError)
    )
)]
async fn create_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<SaveRuleRequest>,
) -> impl IntoResponse {
    let rule = req.into_rule(
        stormwatch_common::id::next_id(),
        &state.config.default_user_id,
        Utc::now(),
    );
    if let Err(e) = rule.validate() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "validation_error",
            &e.to_string(),
        );
    }

    match state
        .store
        .rule_name_taken(&rule.user_id, &rule.name, None)
        .await
    {
        Ok(true) => {
            return error_response(
                StatusCode::CONFLICT,
                &trace_id,
                "duplicate_name",
                &format!("A rule named '{}' already exists", rule.name),
            );
        }
        Ok(false) => {}
        Err(e) => return storage_error_response(&trace_id, &e),
    }

    match state.store.insert_rule(&rule).await {
        Ok(created) => {
            tracing::info!(rule_id = %created.id, name = %created.name, "Alert rule created");
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// 查询单条规则。
#[utoipa::path(
    get,
    path = "/api/alerts/rules/{id}",
    tag = "Rules",
    params(("id" = String, Path, description = "规则 ID")),
    responses(
        (status = 200, description = "规则详情", body = AlertRule),
        (status = 404, description = "规则不存在", body = crate::api::ApiError)
    )
)]
async fn get_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_rule(&id).await {
        Ok(Some(rule)) => success_response(StatusCode::OK, &trace_id, rule),
        Ok(None) => error_response(StatusCode::NOT_FOUND, &trace_id, "not_found", "Rule not found"),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// 更新规则（全量替换）。
#[utoipa::path(
    put,
    path = "/api/alerts/rules/{id}",
    tag = "Rules",
    params(("id" = String, Path, description = "规则 ID")),
    request_body = SaveRuleRequest,
    responses(
        (status = 200, description = "更新后的规则", body = AlertRule),
        (status = 400, description = "校验失败", body = crate::api::ApiError),
        (status = 404, description = "规则不存在", body = crate::api::ApiError),
        (status = 409, description = "同名规则已存在", body = crate::api::ApiError)
    )
)]
async fn update_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SaveRuleRequest>,
) -> impl IntoResponse {
    let existing = match state.store.get_rule(&id).await {
        Ok(Some(rule)) => rule,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, &trace_id, "not_found", "Rule not found");
        }
        Err(e) => return storage_error_response(&trace_id, &e),
    };

    let mut rule = req.into_rule(existing.id.clone(), &state.config.default_user_id, existing.created_at);
    // Ownership never changes through updates.
    rule.user_id = existing.user_id.clone();

    if let Err(e) = rule.validate() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "validation_error",
            &e.to_string(),
        );
    }

    match state
        .store
        .rule_name_taken(&rule.user_id, &rule.name, Some(&id))
        .await
    {
        Ok(true) => {
            return error_response(
                StatusCode::CONFLICT,
                &trace_id,
                "duplicate_name",
                &format!("A rule named '{}' already exists", rule.name),
            );
        }
        Ok(false) => {}
        Err(e) => return storage_error_response(&trace_id, &e),
    }

    match state.store.update_rule(&rule).await {
        Ok(Some(updated)) => {
            tracing::info!(rule_id = %updated.id, "Alert rule updated");
            success_response(StatusCode::OK, &trace_id, updated)
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, &trace_id, "not_found", "Rule not found"),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// 删除规则及其投递历史。
#[utoipa::path(
    delete,
    path = "/api/alerts/rules/{id}",
    tag = "Rules",
    params(("id" = String, Path, description = "规则 ID")),
    responses(
        (status = 200, description = "删除成功"),
        (status = 404, description = "规则不存在", body = crate::api::ApiError)
    )
)]
async fn delete_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_rule(&id).await {
        Ok(true) => {
            state.limiter.forget(&id);
            tracing::info!(rule_id = %id, "Alert rule deleted");
            success_empty_response(StatusCode::OK, &trace_id, "Rule deleted")
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, &trace_id, "not_found", "Rule not found"),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// 测试结果
#[derive(Serialize, ToSchema)]
struct TestRuleResponse {
    /// 当前设置下是否会投递
    would_trigger: bool,
    /// 人类可读的说明
    message: String,
}

/// 规则投递演练：不计冷却与每日上限，不发送任何通知。
#[utoipa::path(
    post,
    path = "/api/alerts/test/{id}",
    tag = "Rules",
    params(("id" = String, Path, description = "规则 ID")),
    responses(
        (status = 200, description = "演练结果", body = TestRuleResponse),
        (status = 404, description = "规则不存在", body = crate::api::ApiError)
    )
)]
async fn test_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let rule = match state.store.get_rule(&id).await {
        Ok(Some(rule)) => rule,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, &trace_id, "not_found", "Rule not found");
        }
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    let settings = match state.store.get_settings_or_default(&rule.user_id).await {
        Ok(s) => s,
        Err(e) => return storage_error_response(&trace_id, &e),
    };

    let outcome = state.dispatcher.preview(&rule, &settings, Utc::now());
    success_response(
        StatusCode::OK,
        &trace_id,
        TestRuleResponse {
            would_trigger: outcome.would_trigger,
            message: outcome.message,
        },
    )
}

pub fn rule_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_rules, create_rule))
        .routes(routes!(get_rule, update_rule, delete_rule))
        .routes(routes!(test_rule))
}
