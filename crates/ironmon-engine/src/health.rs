use chrono::{DateTime, Utc};
use ironmon_device::{DeviceCache, DeviceId, DeviceRecord, STALENESS_WINDOW_MS};
use ironmon_gateway::SyncMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// 读数所处区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelBand {
    Normal,
    /// 达到预警线（上限的 80%）
    PreAlarm,
    /// 达到或超过上限
    Critical,
}

impl LevelBand {
    pub fn classify(device: &DeviceRecord) -> Self {
        if device.is_critical() {
            LevelBand::Critical
        } else if device.is_pre_alarm() {
            LevelBand::PreAlarm
        } else {
            LevelBand::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

/// 趋势与到达上限的粗略预测
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// 每个周期的变化量
    pub rate: f64,
    /// 按当前速率到达上限的秒数，仅在运行、上升且未超限时给出
    pub seconds_to_limit: Option<i64>,
}

impl Trend {
    /// 与上一周期的读数比较；没有历史读数时视为平稳
    pub fn compute(device: &DeviceRecord, previous: Option<f64>, tick_secs: f64) -> Self {
        let rate = previous.map_or(0.0, |prev| device.sensor_value - prev);

        let direction = if rate > 0.0 {
            TrendDirection::Rising
        } else if rate < 0.0 {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        };

        let seconds_to_limit = (direction == TrendDirection::Rising
            && device.status
            && !device.is_critical())
        .then(|| ((device.threshold - device.sensor_value) / rate * tick_secs).round() as i64);

        Self {
            direction,
            rate,
            seconds_to_limit,
        }
    }
}

/// 车间级 KPI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetKpis {
    pub total: usize,
    pub running: usize,
    pub stopped: usize,
    /// 达到上限的设备数
    pub critical: usize,
    pub pre_alarm: usize,
    /// 看门狗报错的设备数
    pub stale: usize,
    /// 运行中设备的平均 OEE，没有运行设备时为 0
    pub avg_oee_running: f64,
}

impl FleetKpis {
    pub fn collect(cache: &DeviceCache) -> Self {
        let mut kpis = FleetKpis {
            total: cache.len(),
            ..Default::default()
        };
        let mut oee_sum = 0.0;

        for device in cache.iter() {
            if device.status {
                kpis.running += 1;
                oee_sum += device.telemetry.oee;
            } else {
                kpis.stopped += 1;
            }
            match LevelBand::classify(device) {
                LevelBand::Critical => kpis.critical += 1,
                LevelBand::PreAlarm => kpis.pre_alarm += 1,
                LevelBand::Normal => {}
            }
            if device.watchdog_error {
                kpis.stale += 1;
            }
        }

        if kpis.running > 0 {
            kpis.avg_oee_running = (oee_sum / kpis.running as f64 * 10.0).round() / 10.0;
        }
        kpis
    }
}

/// 单周期健康检查结果
#[derive(Debug, Clone, Default)]
pub struct HealthReport {
    /// 是否有运行中设备超限
    pub alarm_active: bool,
    /// 运行中且超限的设备
    pub breaching: Vec<DeviceId>,
    /// 看门狗报错的设备
    pub stale: Vec<DeviceId>,
    pub kpis: FleetKpis,
}

/// 健康与告警监控
///
/// 每个周期完整重算，不做防抖也不锁存。
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    staleness_window_ms: i64,
    tick_interval: Duration,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(STALENESS_WINDOW_MS, Duration::from_millis(2000))
    }
}

impl HealthMonitor {
    pub fn new(staleness_window_ms: i64, tick_interval: Duration) -> Self {
        Self {
            staleness_window_ms,
            tick_interval,
        }
    }

    pub fn tick_secs(&self) -> f64 {
        self.tick_interval.as_secs_f64()
    }

    /// 检查缓存
    ///
    /// 在线模式下补设看门狗标志（清除由下一次成功对账完成）；
    /// 本地模式下数据由本地产生，标志一律清除。随后计算告警与 KPI。
    pub fn evaluate(&self, cache: &mut DeviceCache, mode: SyncMode, now: DateTime<Utc>) -> HealthReport {
        let mut report = HealthReport::default();

        for device in cache.iter_mut() {
            if mode.is_local() {
                device.watchdog_error = false;
            } else if !device.watchdog_error
                && device.millis_since_update(now) > self.staleness_window_ms
            {
                warn!(
                    device_id = %device.id,
                    age_ms = device.millis_since_update(now),
                    "Watchdog: no fresh data from remote"
                );
                device.watchdog_error = true;
            }

            if device.watchdog_error {
                report.stale.push(device.id.clone());
            }
            if device.is_breaching_while_running() {
                report.breaching.push(device.id.clone());
            }
        }

        report.alarm_active = !report.breaching.is_empty();
        report.kpis = FleetKpis::collect(cache);

        debug!(
            alarm = report.alarm_active,
            running = report.kpis.running,
            critical = report.kpis.critical,
            stale = report.kpis.stale,
            "Health evaluated"
        );
        report
    }

    pub fn trend(&self, device: &DeviceRecord, last_values: &HashMap<DeviceId, f64>) -> Trend {
        Trend::compute(device, last_values.get(&device.id).copied(), self.tick_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn device(id: &str, value: f64, status: bool, now: DateTime<Utc>) -> DeviceRecord {
        let mut d = DeviceRecord::new(id, format!("Mixer {}", id), 100.0, now);
        d.sensor_value = value;
        d.status = status;
        d
    }

    #[test]
    fn test_band_classification() {
        let now = Utc::now();
        assert_eq!(LevelBand::classify(&device("1", 79.9, true, now)), LevelBand::Normal);
        assert_eq!(LevelBand::classify(&device("1", 80.0, true, now)), LevelBand::PreAlarm);
        assert_eq!(LevelBand::classify(&device("1", 100.0, false, now)), LevelBand::Critical);
    }

    #[test]
    fn test_watchdog_only_online() {
        let now = Utc::now();
        let old = now - ChronoDuration::milliseconds(7000);
        let monitor = HealthMonitor::default();

        let mut cache = DeviceCache::from_records(vec![device("1", 40.0, true, old)]);
        let report = monitor.evaluate(&mut cache, SyncMode::Offline, now);
        assert!(report.stale.is_empty());
        assert!(!cache.get(&"1".into()).unwrap().watchdog_error);

        let report = monitor.evaluate(&mut cache, SyncMode::Online, now);
        assert_eq!(report.stale, vec![DeviceId::from("1")]);
        assert!(cache.get(&"1".into()).unwrap().watchdog_error);

        let report = monitor.evaluate(&mut cache, SyncMode::Empty, now);
        assert!(report.stale.is_empty());
        assert_eq!(report.kpis.stale, 0);
        assert!(!cache.get(&"1".into()).unwrap().watchdog_error);
    }

    #[test]
    fn test_watchdog_cleared_when_offline() {
        let now = Utc::now();
        let old = now - ChronoDuration::milliseconds(9000);
        let monitor = HealthMonitor::default();

        let mut stale = device("1", 40.0, true, old);
        stale.watchdog_error = true;
        let mut cache = DeviceCache::from_records(vec![stale]);

        let report = monitor.evaluate(&mut cache, SyncMode::Offline, now);
        assert!(report.stale.is_empty());
        assert!(!cache.get(&"1".into()).unwrap().watchdog_error);
    }

    #[test]
    fn test_watchdog_within_window() {
        let now = Utc::now();
        let recent = now - ChronoDuration::milliseconds(5000);
        let mut cache = DeviceCache::from_records(vec![device("1", 40.0, true, recent)]);
        let report = HealthMonitor::default().evaluate(&mut cache, SyncMode::Online, now);
        assert!(report.stale.is_empty());
    }

    #[test]
    fn test_alarm_requires_running() {
        let now = Utc::now();
        let monitor = HealthMonitor::default();

        let mut cache = DeviceCache::from_records(vec![device("1", 120.0, false, now)]);
        assert!(!monitor.evaluate(&mut cache, SyncMode::Online, now).alarm_active);

        let mut cache = DeviceCache::from_records(vec![
            device("1", 120.0, true, now),
            device("2", 30.0, true, now),
        ]);
        let report = monitor.evaluate(&mut cache, SyncMode::Online, now);
        assert!(report.alarm_active);
        assert_eq!(report.breaching, vec![DeviceId::from("1")]);
    }

    #[test]
    fn test_trend_prediction() {
        let now = Utc::now();
        let d = device("1", 90.0, true, now);

        let rising = Trend::compute(&d, Some(88.0), 2.0);
        assert_eq!(rising.direction, TrendDirection::Rising);
        assert_eq!(rising.rate, 2.0);
        // (100 - 90) / 2 * 2s
        assert_eq!(rising.seconds_to_limit, Some(10));

        let falling = Trend::compute(&d, Some(91.5), 2.0);
        assert_eq!(falling.direction, TrendDirection::Falling);
        assert_eq!(falling.seconds_to_limit, None);

        let first = Trend::compute(&d, None, 2.0);
        assert_eq!(first.direction, TrendDirection::Stable);

        let stopped = Trend::compute(&device("1", 90.0, false, now), Some(88.0), 2.0);
        assert_eq!(stopped.seconds_to_limit, None);
    }

    #[test]
    fn test_kpis() {
        let now = Utc::now();
        let mut a = device("1", 85.0, true, now);
        a.telemetry.oee = 90.0;
        let mut b = device("2", 40.0, true, now);
        b.telemetry.oee = 86.0;
        let c = device("3", 100.0, false, now);

        let kpis = FleetKpis::collect(&DeviceCache::from_records(vec![a, b, c]));
        assert_eq!(kpis.total, 3);
        assert_eq!(kpis.running, 2);
        assert_eq!(kpis.stopped, 1);
        assert_eq!(kpis.critical, 1);
        assert_eq!(kpis.pre_alarm, 1);
        assert_eq!(kpis.avg_oee_running, 88.0);
    }
}
