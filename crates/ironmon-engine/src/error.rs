use ironmon_device::DeviceError;
use ironmon_gateway::GatewayError;
use thiserror::Error;

/// 引擎错误（仅由手动操作返回，周期任务内部不会失败）
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Remote store error: {0}")]
    Remote(#[from] GatewayError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Device(DeviceError::validation(msg))
    }

    pub fn not_found(id: impl ToString) -> Self {
        EngineError::Device(DeviceError::NotFound(id.to_string()))
    }
}
