use serde::{Deserialize, Serialize};

/// 注册设备请求
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateDeviceRequest {
    pub name: String,
    pub threshold: f64,
}

/// 修改设备请求
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateDeviceRequest {
    pub name: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceCreatedResponse {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToggleResponse {
    pub id: String,
    pub running: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmergencyStopResponse {
    pub stopped: usize,
}
