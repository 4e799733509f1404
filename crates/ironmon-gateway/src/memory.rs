use crate::record::{RecordPatch, RemoteRecord};
use crate::store::RemoteStore;
use crate::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// 内存远端存储
///
/// 用于演示模式与测试，可以注入传输故障。
pub struct InMemoryRemoteStore {
    records: RwLock<Vec<RemoteRecord>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    updates: AtomicUsize,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<RemoteRecord>) -> Self {
        let max_id = records
            .iter()
            .filter_map(|r| r.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            records: RwLock::new(records),
            next_id: AtomicU64::new(max_id + 1),
            failing: AtomicBool::new(false),
            updates: AtomicUsize::new(0),
        }
    }

    /// 切换故障注入：为 true 时所有请求返回传输错误
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 已成功处理的 update 次数
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<RemoteRecord> {
        self.records.read().await.clone()
    }

    pub async fn replace_all(&self, records: Vec<RemoteRecord>) {
        *self.records.write().await = records;
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(GatewayError::unavailable("injected transport failure"))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn list(&self) -> Result<Vec<RemoteRecord>> {
        self.check()?;
        Ok(self.records.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<RemoteRecord> {
        self.check()?;
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn create(&self, patch: &RecordPatch) -> Result<RemoteRecord> {
        self.check()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let mut record = RemoteRecord::new(id);
        record.apply(patch);
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<()> {
        self.check()?;
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        record.apply(patch);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check()?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
