use thiserror::Error;

/// 远端存储访问错误
///
/// 网关在对账时会吞掉这些错误并降级为离线模式，
/// 只有直接调用存储接口（管理操作）时才会向上传递。
#[derive(Error, Debug)]
pub enum GatewayError {
    /// 网络传输错误
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 非成功响应
    #[error("Remote store responded with status {0}")]
    Status(u16),

    /// 响应解析错误
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// 记录未找到
    #[error("Remote record not found: {0}")]
    NotFound(String),

    /// 存储不可用
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        GatewayError::Unavailable(msg.into())
    }

    /// 是否属于传输层故障（网络、状态码、解析）
    pub fn is_transport(&self) -> bool {
        !matches!(self, GatewayError::NotFound(_))
    }
}
