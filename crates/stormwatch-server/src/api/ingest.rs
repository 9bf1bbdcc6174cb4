use crate::api::{error_response, storage_error_response, success_response};
use crate::logging::TraceId;
use crate::pipeline::{self, PipelineReport};
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use stormwatch_common::types::Event;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 事件批次请求体
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngestRequest {
    /// 归一化后的灾害事件列表（非空）
    pub events: Vec<Event>,
}

/// 接收一批归一化事件并运行全量评估管线。
#[utoipa::path(
    post,
    path = "/api/alerts/ingest",
    tag = "Ingest",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "管线统计", body = PipelineReport),
        (status = 400, description = "空批次", body = crate::api::ApiError)
    )
)]
async fn ingest_events(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> impl IntoResponse {
    if req.events.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "empty_batch",
            "Event batch must not be empty",
        );
    }

    match pipeline::process_batch(&state, &req.events, Utc::now()).await {
        Ok(report) => success_response(StatusCode::OK, &trace_id, report),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn ingest_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(ingest_events))
}
