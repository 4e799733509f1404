use crate::health::{FleetKpis, HealthMonitor, HealthReport, LevelBand, Trend};
use crate::state::MonitorState;
use chrono::{DateTime, Utc};
use ironmon_device::{CacheDiff, DeviceRecord};
use ironmon_gateway::{ConnectivityStatus, Severity, SyncMode};
use serde::{Deserialize, Serialize};

/// 单台设备的展示数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceView {
    #[serde(flatten)]
    pub record: DeviceRecord,
    pub band: LevelBand,
    pub trend: Trend,
    pub near_limit: bool,
    /// 读数占上限的百分比，封顶 100
    pub load_percent: f64,
}

impl DeviceView {
    pub fn new(record: DeviceRecord, trend: Trend) -> Self {
        let load_percent = if record.threshold > 0.0 {
            (record.sensor_value / record.threshold * 100.0).min(100.0)
        } else {
            100.0
        };
        Self {
            band: LevelBand::classify(&record),
            near_limit: record.is_near_limit(),
            load_percent,
            trend,
            record,
        }
    }
}

/// 每个周期发布给展示层的快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub tick: u64,
    pub taken_at: DateTime<Utc>,
    pub mode: SyncMode,
    pub connectivity: ConnectivityStatus,
    pub alarm_active: bool,
    pub kpis: FleetKpis,
    pub devices: Vec<DeviceView>,
    /// 自上次发布以来新增/移除的设备
    pub diff: CacheDiff,
}

impl DashboardSnapshot {
    /// 首次同步之前的占位快照
    pub fn connecting(now: DateTime<Utc>) -> Self {
        Self {
            tick: 0,
            taken_at: now,
            mode: SyncMode::Online,
            connectivity: ConnectivityStatus {
                text: "CONNECTING".to_string(),
                severity: Severity::Warning,
            },
            alarm_active: false,
            kpis: FleetKpis::default(),
            devices: Vec::new(),
            diff: CacheDiff::default(),
        }
    }

    pub fn build(
        tick: u64,
        now: DateTime<Utc>,
        state: &MonitorState,
        report: &HealthReport,
        health: &HealthMonitor,
        diff: CacheDiff,
    ) -> Self {
        let devices = state
            .cache
            .iter()
            .map(|d| DeviceView::new(d.clone(), health.trend(d, &state.last_values)))
            .collect();

        Self {
            tick,
            taken_at: now,
            mode: state.mode,
            connectivity: state.connectivity.clone(),
            alarm_active: report.alarm_active,
            kpis: report.kpis.clone(),
            devices,
            diff,
        }
    }

    pub fn device(&self, id: &str) -> Option<&DeviceView> {
        self.devices.iter().find(|v| v.record.id.as_str() == id)
    }
}
