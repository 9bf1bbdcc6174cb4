use crate::state::AppState;
use crate::{api, logging};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "stormwatch API",
        description = "stormwatch 灾害告警规则与通知投递 REST API",
    ),
    tags(
        (name = "Health", description = "服务健康检查"),
        (name = "Rules", description = "告警规则管理与演练"),
        (name = "History", description = "投递历史与汇总"),
        (name = "Settings", description = "用户通知设置"),
        (name = "Ingest", description = "事件批次接入")
    )
)]
struct ApiDoc;

pub fn build_http_app(state: AppState) -> Router {
    let (health_router, health_spec) = api::health_routes().split_for_parts();
    let (rule_router, rule_spec) = api::rules::rule_routes().split_for_parts();
    let (history_router, history_spec) = api::history::history_routes().split_for_parts();
    let (settings_router, settings_spec) = api::settings::settings_routes().split_for_parts();
    let (ingest_router, ingest_spec) = api::ingest::ingest_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(health_spec);
    merged_spec.merge(rule_spec);
    merged_spec.merge(history_spec);
    merged_spec.merge(settings_spec);
    merged_spec.merge(ingest_spec);

    // Empty origin list means development mode: allow everything.
    let allow_origin = if state.config.cors_allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            state
                .config
                .cors_allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok()),
        )
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    health_router
        .merge(rule_router)
        .merge(history_router)
        .merge(settings_router)
        .merge(ingest_router)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api/openapi.json", merged_spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
