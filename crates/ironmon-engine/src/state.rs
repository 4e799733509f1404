use chrono::{DateTime, Utc};
use ironmon_device::{CacheDiff, DataLogger, DeviceCache, DeviceId, HistoryLogEntry};
use ironmon_gateway::{ConnectivityStatus, ReconcileOutcome, Severity, SyncMode};
use std::collections::HashMap;
use tracing::info;

/// 监控共享状态
///
/// 由周期任务与手动操作共同持有（`Arc<RwLock<MonitorState>>`），
/// 网络请求期间不持有锁。
#[derive(Debug)]
pub struct MonitorState {
    pub cache: DeviceCache,
    pub mode: SyncMode,
    pub connectivity: ConnectivityStatus,
    pub logger: DataLogger,
    /// 周期开始时的读数，用于趋势计算
    pub last_values: HashMap<DeviceId, f64>,
    pending_diff: CacheDiff,
}

impl MonitorState {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            cache: DeviceCache::new(),
            mode: SyncMode::Online,
            connectivity: ConnectivityStatus {
                text: "CONNECTING".to_string(),
                severity: Severity::Warning,
            },
            logger: DataLogger::with_capacity(log_capacity),
            last_values: HashMap::new(),
            pending_diff: CacheDiff::default(),
        }
    }

    /// 应用对账结果，返回模式是否发生变化
    pub fn apply_outcome(&mut self, outcome: ReconcileOutcome) -> bool {
        let connectivity = outcome.connectivity();
        let changed = self.mode != outcome.mode || self.connectivity != connectivity;

        if changed {
            info!(
                from = %self.mode,
                to = %outcome.mode,
                indicator = %connectivity.text,
                seeded = outcome.seeded,
                "Connectivity changed"
            );
        }

        self.cache = outcome.cache;
        self.mode = outcome.mode;
        self.connectivity = connectivity;
        self.record_diff(outcome.diff);
        changed
    }

    /// 记录设备增删；移除的设备同时丢弃历史与趋势基准
    pub fn record_diff(&mut self, diff: CacheDiff) {
        for id in &diff.removed {
            self.logger.forget(id);
            self.last_values.remove(id);
        }
        self.pending_diff.merge(diff);
    }

    /// 取出并清空累计的增删
    pub fn take_diff(&mut self) -> CacheDiff {
        std::mem::take(&mut self.pending_diff)
    }

    pub fn capture_last_values(&mut self) {
        self.last_values = self.cache.value_snapshot();
    }

    /// 本地模式下仿真即为数据来源，刷新对账时间
    pub fn stamp_local(&mut self, now: DateTime<Utc>) {
        for device in self.cache.iter_mut() {
            device.last_update = now;
        }
    }

    /// 每台设备追加一条历史
    pub fn log_tick(&mut self, now: DateTime<Utc>) {
        for device in self.cache.iter() {
            self.logger.append(&device.id, HistoryLogEntry::capture(device, now));
        }
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(ironmon_device::DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironmon_device::DeviceRecord;
    use ironmon_gateway::{fallback_cache, reconcile, GatewayError, RemoteRecord};

    #[test]
    fn test_apply_outcome_tracks_mode_and_diff() {
        let now = Utc::now();
        let mut state = MonitorState::default();

        let outcome = reconcile(
            state.cache.clone(),
            Err(GatewayError::unavailable("down")),
            now,
            6000,
        );
        assert!(state.apply_outcome(outcome));
        assert_eq!(state.mode, SyncMode::Offline);
        assert_eq!(state.connectivity.text, "OFFLINE (DEMO)");
        assert_eq!(state.cache, fallback_cache(now));

        let diff = state.take_diff();
        assert_eq!(diff.added.len(), 2);
        assert!(state.take_diff().is_empty());

        // 同一模式再次对账不算变化
        let outcome = reconcile(state.cache.clone(), Err(GatewayError::unavailable("down")), now, 6000);
        assert!(!state.apply_outcome(outcome));
    }

    #[test]
    fn test_removed_devices_lose_history() {
        let now = Utc::now();
        let mut state = MonitorState::default();
        state.cache = DeviceCache::from_records(vec![
            DeviceRecord::new("1", "A", 80.0, now),
            DeviceRecord::new("2", "B", 80.0, now),
        ]);
        state.log_tick(now);
        state.capture_last_values();

        let outcome = reconcile(
            state.cache.clone(),
            Ok(vec![RemoteRecord::new("1").with_name("A")]),
            now,
            6000,
        );
        state.apply_outcome(outcome);

        assert_eq!(state.logger.len(&"1".into()), 1);
        assert_eq!(state.logger.len(&"2".into()), 0);
        assert!(!state.last_values.contains_key(&DeviceId::from("2")));
        assert_eq!(state.take_diff().removed, vec![DeviceId::from("2")]);
    }
}
