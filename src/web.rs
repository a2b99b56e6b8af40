//! Axum-based HTTP server exposing the data points, with an OpenAPI document

use crate::config::Config;
use crate::error::{Result, SevError};
use crate::sensor::DataPointView;
use crate::service::MeterService;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MeterService>,
    pub config: Arc<Config>,
}

#[utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
))]
pub(crate) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[utoipa::path(get, path = "/api/sensors", responses(
    (status = 200, description = "All data points", body = [DataPointView])
))]
pub(crate) async fn list_sensors(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.data_points().await)
}

#[utoipa::path(get, path = "/api/sensors/{unique_id}",
    params(("unique_id" = String, Path, description = "Data point unique id")),
    responses(
        (status = 200, description = "One data point", body = DataPointView),
        (status = 404, description = "Unknown data point")
    )
)]
pub(crate) async fn get_sensor(
    State(state): State<AppState>,
    Path(unique_id): Path<String>,
) -> impl IntoResponse {
    match state.service.data_point(&unique_id).await {
        Some(view) => (StatusCode::OK, Json(serde_json::json!(view))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "unknown sensor"})),
        ),
    }
}

#[utoipa::path(get, path = "/api/meters", responses(
    (status = 200, description = "Derived metric table per installation")
))]
pub(crate) async fn meters(State(state): State<AppState>) -> impl IntoResponse {
    let tables: serde_json::Map<String, serde_json::Value> = state
        .service
        .tables()
        .into_iter()
        .map(|(inst, table)| {
            let value = serde_json::to_value(table.as_ref())
                .unwrap_or(serde_json::json!({"error": "serialization"}));
            (inst, value)
        })
        .collect();
    Json(serde_json::Value::Object(tables))
}

#[utoipa::path(get, path = "/api/config", responses((status = 200)))]
pub(crate) async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let mut json = serde_json::to_value(state.config.as_ref())
        .unwrap_or(serde_json::json!({"error": "serialization"}));
    if let Some(api) = json.get_mut("api").and_then(|v| v.as_object_mut()) {
        api.insert("api_key".to_string(), serde_json::json!("********"));
    }
    Json(json)
}

#[utoipa::path(get, path = "/api/config/schema", responses((status = 200)))]
pub(crate) async fn get_config_schema() -> impl IntoResponse {
    let schema = schemars::schema_for!(crate::config::Config);
    Json(serde_json::to_value(&schema).unwrap_or(serde_json::json!({"error": "schema"})))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    paths(health, list_sensors, get_sensor, meters, get_config, get_config_schema),
    components(schemas(DataPointView, crate::metrics::MetricKind, crate::metrics::StateClass)),
    tags((name = "sevmeter", description = "SEV meter data points"))
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sensors", get(list_sensors))
        .route("/api/sensors/{unique_id}", get(get_sensor))
        .route("/api/meters", get(meters))
        .route("/api/config", get(get_config))
        .route("/api/config/schema", get(get_config_schema))
        .route("/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SevError::web(format!("cannot bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api, schema /openapi.json)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .await
        .map_err(|e| SevError::web(e.to_string()))
}
