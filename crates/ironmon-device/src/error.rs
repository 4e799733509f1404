use thiserror::Error;

/// 设备管理错误类型
#[derive(Error, Debug)]
pub enum DeviceError {
    /// 设备未找到
    #[error("Device not found: {0}")]
    NotFound(String),

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 没有可导出的数据
    #[error("No data available: {0}")]
    NoData(String),

    /// CSV 导出错误
    #[error("Export error: {0}")]
    ExportError(#[from] csv::Error),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),

    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 设备管理结果类型
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// 创建验证错误
    pub fn validation(msg: impl Into<String>) -> Self {
        DeviceError::ValidationError(msg.into())
    }

    /// 创建内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        DeviceError::InternalError(msg.into())
    }

    /// 创建无数据错误
    pub fn no_data(msg: impl Into<String>) -> Self {
        DeviceError::NoData(msg.into())
    }
}
