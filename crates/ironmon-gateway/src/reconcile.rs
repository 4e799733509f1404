use crate::fallback::fallback_cache;
use crate::record::RemoteRecord;
use crate::store::RemoteStore;
use crate::Result;
use chrono::{DateTime, Utc};
use ironmon_device::model::MSG_NORMAL;
use ironmon_device::{
    CacheDiff, DeviceCache, DeviceId, DeviceRecord, Zone, DEFAULT_THRESHOLD_C, SENSOR_FLOOR_C,
    STALENESS_WINDOW_MS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 同步模式（由最近一次对账结果决定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMode {
    /// 远端可用且有数据
    Online,
    /// 远端不可达或返回错误
    Offline,
    /// 远端可用但列表为空
    Empty,
}

impl SyncMode {
    /// 离线与空列表都按本地仿真处理
    pub fn is_local(&self) -> bool {
        !matches!(self, SyncMode::Online)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Online => "ONLINE",
            SyncMode::Offline => "OFFLINE",
            SyncMode::Empty => "EMPTY",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 连接指示器级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Danger,
}

/// 连接状态指示（文本 + 级别）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub text: String,
    pub severity: Severity,
}

impl ConnectivityStatus {
    pub fn for_mode(mode: SyncMode) -> Self {
        let (text, severity) = match mode {
            SyncMode::Online => ("ONLINE", Severity::Success),
            SyncMode::Empty => ("REMOTE EMPTY - LOCAL MODE", Severity::Warning),
            SyncMode::Offline => ("OFFLINE (DEMO)", Severity::Danger),
        };
        Self {
            text: text.to_string(),
            severity,
        }
    }
}

/// 对账结果
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// 新的设备缓存
    pub cache: DeviceCache,
    /// 新的同步模式
    pub mode: SyncMode,
    /// 与旧缓存相比新增/移除的设备
    pub diff: CacheDiff,
    /// 是否使用了演示数据填充
    pub seeded: bool,
}

impl ReconcileOutcome {
    pub fn connectivity(&self) -> ConnectivityStatus {
        ConnectivityStatus::for_mode(self.mode)
    }
}

/// 将拉取结果与旧缓存合并
///
/// - 拉取失败：离线模式；旧缓存为空时填充演示数据，否则原样保留
/// - 空列表：EMPTY 模式；处理方式同上
/// - 有数据：在线模式；逐条映射并按 ID 继承扩展遥测
pub fn reconcile(
    previous: DeviceCache,
    fetched: Result<Vec<RemoteRecord>>,
    now: DateTime<Utc>,
    staleness_window_ms: i64,
) -> ReconcileOutcome {
    let records = match fetched {
        Ok(records) if !records.is_empty() => records,
        Ok(_) => return keep_or_seed(previous, SyncMode::Empty, now),
        Err(e) => {
            warn!(error = %e, "Remote fetch failed, falling back to local simulation");
            return keep_or_seed(previous, SyncMode::Offline, now);
        }
    };

    let merged: Vec<DeviceRecord> = records
        .iter()
        .map(|raw| {
            let id = DeviceId::from(raw.id.as_str());
            to_device_record(raw, previous.get(&id), now, staleness_window_ms)
        })
        .collect();
    let cache = DeviceCache::from_records(merged);
    let diff = CacheDiff::between(&previous, &cache);

    debug!(
        devices = cache.len(),
        added = diff.added.len(),
        removed = diff.removed.len(),
        "Reconciled remote records"
    );

    ReconcileOutcome {
        cache,
        mode: SyncMode::Online,
        diff,
        seeded: false,
    }
}

fn keep_or_seed(previous: DeviceCache, mode: SyncMode, now: DateTime<Utc>) -> ReconcileOutcome {
    if previous.is_empty() {
        let cache = fallback_cache(now);
        let diff = CacheDiff::between(&previous, &cache);
        ReconcileOutcome {
            cache,
            mode,
            diff,
            seeded: true,
        }
    } else {
        ReconcileOutcome {
            cache: previous,
            mode,
            diff: CacheDiff::default(),
            seeded: false,
        }
    }
}

/// 把远端记录映射为设备记录，扩展字段从旧记录显式继承
fn to_device_record(
    raw: &RemoteRecord,
    previous: Option<&DeviceRecord>,
    now: DateTime<Utc>,
    staleness_window_ms: i64,
) -> DeviceRecord {
    let id = DeviceId::from(raw.id.as_str());
    let watchdog_error = previous
        .map(|p| p.millis_since_update(now) > staleness_window_ms)
        .unwrap_or(false);

    DeviceRecord {
        zone: Zone::for_id(&id),
        name: raw.name().unwrap_or_else(|| format!("Device {}", id)),
        sensor_value: raw.sensor_value().unwrap_or(SENSOR_FLOOR_C).max(SENSOR_FLOOR_C),
        status: raw.running().unwrap_or(false),
        threshold: raw.threshold_value().unwrap_or(DEFAULT_THRESHOLD_C),
        message: raw
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| MSG_NORMAL.to_string()),
        last_update: now,
        watchdog_error,
        telemetry: previous.map(|p| p.telemetry.clone()).unwrap_or_default(),
        id,
    }
}

/// 远端同步网关
pub struct SyncGateway {
    store: Arc<dyn RemoteStore>,
    staleness_window_ms: i64,
}

impl SyncGateway {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            staleness_window_ms: STALENESS_WINDOW_MS,
        }
    }

    pub fn with_staleness_window(mut self, window_ms: i64) -> Self {
        self.staleness_window_ms = window_ms;
        self
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn staleness_window_ms(&self) -> i64 {
        self.staleness_window_ms
    }

    /// 拉取远端列表（不持有缓存锁）
    pub async fn fetch(&self) -> Result<Vec<RemoteRecord>> {
        self.store.list().await
    }

    pub fn reconcile(
        &self,
        previous: DeviceCache,
        fetched: Result<Vec<RemoteRecord>>,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        reconcile(previous, fetched, now, self.staleness_window_ms)
    }

    /// 拉取并对账；任何传输错误都降级为离线模式，不会返回错误
    pub async fn sync(&self, previous: DeviceCache, now: DateTime<Utc>) -> ReconcileOutcome {
        let fetched = self.fetch().await;
        self.reconcile(previous, fetched, now)
    }
}
