use crate::record::{RecordPatch, RemoteRecord};
use crate::Result;
use async_trait::async_trait;

/// 远端设备存储接口
///
/// 一个支持 list / get / create / update / delete 的集合端点。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 列出全部记录
    async fn list(&self) -> Result<Vec<RemoteRecord>>;

    /// 获取单条记录
    async fn get(&self, id: &str) -> Result<RemoteRecord>;

    /// 新建记录，返回远端分配 ID 后的记录
    async fn create(&self, patch: &RecordPatch) -> Result<RemoteRecord>;

    /// 按 ID 更新（幂等）
    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<()>;

    /// 按 ID 删除
    async fn delete(&self, id: &str) -> Result<()>;

    /// 存储名称（用于日志）
    fn name(&self) -> &str;
}
