use crate::error::{ApiError, Result};
use crate::state::AppState;
use axum::http::HeaderMap;
use tracing::warn;

/// 主管 PIN 请求头
pub const SUPERVISOR_PIN_HEADER: &str = "x-supervisor-pin";

/// 校验主管权限；日志与报表导出、设备增删改都需要
pub fn require_supervisor(headers: &HeaderMap, state: &AppState) -> Result<()> {
    let pin = headers
        .get(SUPERVISOR_PIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if pin.is_empty() || pin != &*state.supervisor_pin {
        warn!("Supervisor access denied");
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}
