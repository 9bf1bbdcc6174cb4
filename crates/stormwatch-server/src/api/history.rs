use crate::api::pagination::PageQuery;
use crate::api::{storage_error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stormwatch_common::types::{AlertType, DeliveryStatus, Severity};
use stormwatch_storage::store::{AlertDeliveryRow, DeliveryFilter};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// 投递历史查询条件
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// 所属用户（缺省为全部用户）
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "rule_id__eq")]
    pub rule_id_eq: Option<String>,
    #[serde(default, rename = "status__eq")]
    pub status_eq: Option<DeliveryStatus>,
    #[serde(default, rename = "severity__eq")]
    pub severity_eq: Option<Severity>,
    #[serde(default, rename = "alert_type__eq")]
    pub alert_type_eq: Option<AlertType>,
}

/// 投递历史条目
#[derive(Serialize, ToSchema)]
struct DeliveryResponse {
    id: String,
    rule_id: String,
    user_id: String,
    rule_name: String,
    alert_type: String,
    severity: String,
    title: String,
    message: String,
    location: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    notification_method: String,
    status: String,
    error_message: Option<String>,
    /// 触发事件的原始载荷
    source_data: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl From<AlertDeliveryRow> for DeliveryResponse {
    fn from(row: AlertDeliveryRow) -> Self {
        let source_data = row
            .source_data
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok());
        Self {
            id: row.id,
            rule_id: row.rule_id,
            user_id: row.user_id,
            rule_name: row.rule_name,
            alert_type: row.alert_type,
            severity: row.severity,
            title: row.title,
            message: row.message,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            notification_method: row.notification_method,
            status: row.status,
            error_message: row.error_message,
            source_data,
            created_at: row.created_at,
            sent_at: row.sent_at,
        }
    }
}

/// 分页查询投递历史（新→旧）。
#[utoipa::path(
    get,
    path = "/api/alerts/history",
    tag = "History",
    params(HistoryQuery, PageQuery),
    responses(
        (status = 200, description = "投递历史分页列表", body = Vec<DeliveryResponse>)
    )
)]
async fn list_history(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
    Query(pagination): Query<PageQuery>,
) -> impl IntoResponse {
    let filter = DeliveryFilter {
        user_id: query.user_id,
        rule_id_eq: query.rule_id_eq,
        status_eq: query.status_eq,
        severity_eq: query.severity_eq,
        alert_type_eq: query.alert_type_eq,
    };
    let limit = pagination.limit();
    let offset = pagination.offset();

    let total = match state.store.count_deliveries(&filter).await {
        Ok(v) => v,
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    match state.store.list_deliveries(&filter, limit, offset).await {
        Ok(rows) => {
            let items: Vec<DeliveryResponse> = rows.into_iter().map(Into::into).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// 汇总查询条件
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// 所属用户（缺省为服务器默认用户）
    #[serde(default)]
    pub user_id: Option<String>,
}

/// 投递历史按状态/级别/渠道汇总。
#[utoipa::path(
    get,
    path = "/api/alerts/history/summary",
    tag = "History",
    params(SummaryQuery),
    responses(
        (status = 200, description = "投递汇总")
    )
)]
async fn history_summary(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    let user_id = query
        .user_id
        .unwrap_or_else(|| state.config.default_user_id.clone());
    match state.store.delivery_summary(&user_id).await {
        Ok(summary) => success_response(StatusCode::OK, &trace_id, summary),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn history_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_history))
        .routes(routes!(history_summary))
}
