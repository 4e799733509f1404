use crate::auth::require_supervisor;
use crate::error::{ApiError, Result};
use crate::models::*;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use ironmon_device::{
    device_log_csv, device_log_file_name, fleet_csv, DeviceFilter, DeviceId, DeviceRecord,
    ReportKind,
};
use ironmon_engine::DashboardSnapshot;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// 创建 API 路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 看板
        .route("/api/v1/dashboard", get(get_dashboard))
        // 设备
        .route("/api/v1/devices", get(list_devices).post(create_device))
        .route("/api/v1/devices/:device_id", put(update_device).delete(delete_device))
        .route("/api/v1/devices/:device_id/toggle", post(toggle_device))
        .route("/api/v1/devices/:device_id/log.csv", get(device_log_report))
        .route("/api/v1/emergency-stop", post(emergency_stop))
        // 报表
        .route("/api/v1/reports/fleet.csv", get(fleet_report))
        .route("/api/v1/reports/shift.csv", get(shift_report))
        // 添加中间件
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 健康检查
async fn health_check() -> &'static str {
    "OK"
}

/// 最新快照
async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.scheduler.latest())
}

/// 按名称、状态过滤并排序
async fn list_devices(
    State(state): State<AppState>,
    Query(filter): Query<DeviceFilter>,
) -> Json<Vec<DeviceRecord>> {
    debug!(?filter, "Listing devices");
    let monitor = state.scheduler.state();
    let monitor = monitor.read().await;
    Json(monitor.cache.list(&filter))
}

async fn toggle_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<ToggleResponse>> {
    let running = state.scheduler.toggle(&DeviceId::from(device_id.as_str())).await?;
    Ok(Json(ToggleResponse {
        id: device_id,
        running,
    }))
}

async fn emergency_stop(State(state): State<AppState>) -> Json<EmergencyStopResponse> {
    let stopped = state.scheduler.emergency_stop_all().await;
    Json(EmergencyStopResponse { stopped })
}

async fn create_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<(StatusCode, Json<DeviceCreatedResponse>)> {
    require_supervisor(&headers, &state)?;
    info!(name = %req.name, threshold = req.threshold, "Registering device");

    let id = state.scheduler.create_device(&req.name, req.threshold).await?;
    Ok((
        StatusCode::CREATED,
        Json(DeviceCreatedResponse { id: id.to_string() }),
    ))
}

async fn update_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateDeviceRequest>,
) -> Result<StatusCode> {
    require_supervisor(&headers, &state)?;
    state
        .scheduler
        .edit_device(&DeviceId::from(device_id), &req.name, req.threshold)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    require_supervisor(&headers, &state)?;
    state.scheduler.delete_device(&DeviceId::from(device_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fleet_report(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    require_supervisor(&headers, &state)?;
    fleet_export(&state, ReportKind::Full).await
}

async fn shift_report(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    require_supervisor(&headers, &state)?;
    fleet_export(&state, ReportKind::Shift).await
}

async fn fleet_export(state: &AppState, kind: ReportKind) -> Result<Response> {
    let monitor = state.scheduler.state();
    let body = {
        let monitor = monitor.read().await;
        fleet_csv(&monitor.cache, kind, Utc::now())?
    };
    Ok(csv_response(kind.file_name(), body))
}

async fn device_log_report(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    require_supervisor(&headers, &state)?;

    let id = DeviceId::from(device_id.as_str());
    let monitor = state.scheduler.state();
    let monitor = monitor.read().await;
    let device = monitor
        .cache
        .get(&id)
        .ok_or_else(|| ApiError::DeviceNotFound(device_id.clone()))?;

    let now = Utc::now();
    let entries = monitor.logger.export_all(&id);
    let body = device_log_csv(&device.name, &entries, now)?;
    Ok(csv_response(&device_log_file_name(&device.name, now), body))
}

fn csv_response(file_name: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}
