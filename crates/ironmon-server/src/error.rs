use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ironmon_device::DeviceError;
use ironmon_engine::EngineError;
use serde_json::json;
use thiserror::Error;

/// API 错误类型
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 缺少或错误的主管 PIN
    #[error("Supervisor PIN required")]
    Unauthorized,

    #[error("No data available: {0}")]
    NoData(String),

    /// 远端存储返回错误或不可达
    #[error("Remote store error: {0}")]
    RemoteError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NoData(_) => StatusCode::NOT_FOUND,
            ApiError::RemoteError(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::NotFound(id) => ApiError::DeviceNotFound(id),
            DeviceError::ValidationError(msg) => ApiError::ValidationError(msg),
            DeviceError::NoData(msg) => ApiError::NoData(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Device(e) => e.into(),
            EngineError::Remote(e) => ApiError::RemoteError(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
