use crate::{DeviceId, DeviceRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// 每台设备默认保留的历史条数
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// 历史日志条目（用于报表导出）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryLogEntry {
    pub time: DateTime<Utc>,
    /// 温度，保留一位小数
    pub temperature: f64,
    pub rpm: u32,
    pub vibration: f64,
    pub oee: f64,
    /// RUNNING / STOPPED
    pub status: String,
    pub downtime_cause: String,
    pub operator: String,
}

impl HistoryLogEntry {
    /// 从设备当前状态生成一条记录
    pub fn capture(device: &DeviceRecord, time: DateTime<Utc>) -> Self {
        Self {
            time,
            temperature: (device.sensor_value * 10.0).round() / 10.0,
            rpm: device.telemetry.rpm,
            vibration: device.telemetry.vibration,
            oee: device.telemetry.oee,
            status: if device.status { "RUNNING" } else { "STOPPED" }.to_string(),
            downtime_cause: device.telemetry.downtime_cause.as_str().to_string(),
            operator: device
                .telemetry
                .operator
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// 数据记录器
///
/// 每台设备一个有界队列，超出容量时淘汰最旧的条目。
#[derive(Debug, Clone)]
pub struct DataLogger {
    logs: HashMap<DeviceId, VecDeque<HistoryLogEntry>>,
    capacity: usize,
}

impl DataLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            logs: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 追加一条记录
    pub fn append(&mut self, device_id: &DeviceId, entry: HistoryLogEntry) {
        let queue = self
            .logs
            .entry(device_id.clone())
            .or_insert_with(VecDeque::new);

        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(entry);
    }

    /// 按时间顺序导出某台设备的全部记录
    pub fn export_all(&self, device_id: &DeviceId) -> Vec<HistoryLogEntry> {
        self.logs
            .get(device_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, device_id: &DeviceId) -> usize {
        self.logs.get(device_id).map(VecDeque::len).unwrap_or(0)
    }

    /// 丢弃已移除设备的历史
    pub fn forget(&mut self, device_id: &DeviceId) {
        if self.logs.remove(device_id).is_some() {
            debug!(device_id = %device_id, "Dropped history of removed device");
        }
    }
}

impl Default for DataLogger {
    fn default() -> Self {
        Self::new()
    }
}
