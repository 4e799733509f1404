use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 传感器温度下限（°C），任何情况下读数都不会低于该值
pub const SENSOR_FLOOR_C: f64 = 20.0;

/// 预警阈值比例（相对于安全上限）
pub const PRE_ALARM_RATIO: f64 = 0.8;

/// 远端记录缺少阈值时使用的默认安全上限
pub const DEFAULT_THRESHOLD_C: f64 = 90.0;

/// 看门狗超时窗口（毫秒）
pub const STALENESS_WINDOW_MS: i64 = 6000;

pub const MSG_NORMAL: &str = "Normal operation";
pub const MSG_SAFE_STOP: &str = "SAFE-STOP: limit exceeded";
pub const MSG_MANUAL_START: &str = "Manual start";
pub const MSG_MANUAL_STOP: &str = "Manual stop";
pub const MSG_EMERGENCY_STOP: &str = "EMERGENCY STOP EXECUTED";
pub const MSG_REGISTERED: &str = "Device registered";

/// 设备 ID（由远端存储或本地种子数据分配，不可变）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 数字形式的 ID（远端存储通常使用自增整数）
    pub fn as_number(&self) -> Option<u64> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for DeviceId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// 产线分区（由设备 ID 推导）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    #[serde(rename = "Line A - Mixing")]
    LineA,
    #[serde(rename = "Line B - Packaging")]
    LineB,
}

impl Zone {
    /// ID ≤ 3 的设备属于 A 线，其余（包括非数字 ID）属于 B 线
    pub fn for_id(id: &DeviceId) -> Self {
        match id.as_number() {
            Some(n) if n <= 3 => Zone::LineA,
            _ => Zone::LineB,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::LineA => "Line A - Mixing",
            Zone::LineB => "Line B - Packaging",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 停机原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DowntimeCause {
    /// 未记录（运行中）
    #[default]
    None,
    /// 超温安全停机
    OverTemperature,
    /// 电气故障
    ElectricalFault,
    /// 机械卡料
    MechanicalJam,
    /// 预防性维护
    PreventiveMaintenance,
    /// 清洁
    Cleaning,
    /// 电机过热
    MotorOverheating,
}

impl DowntimeCause {
    /// 非超温停机时随机选取的原因集合
    pub const RANDOM_POOL: [DowntimeCause; 5] = [
        DowntimeCause::ElectricalFault,
        DowntimeCause::MechanicalJam,
        DowntimeCause::PreventiveMaintenance,
        DowntimeCause::Cleaning,
        DowntimeCause::MotorOverheating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DowntimeCause::None => "-",
            DowntimeCause::OverTemperature => "Over-temperature",
            DowntimeCause::ElectricalFault => "Electrical fault",
            DowntimeCause::MechanicalJam => "Mechanical jam",
            DowntimeCause::PreventiveMaintenance => "Preventive maintenance",
            DowntimeCause::Cleaning => "Cleaning",
            DowntimeCause::MotorOverheating => "Motor overheating",
        }
    }

    pub fn is_recorded(&self) -> bool {
        *self != DowntimeCause::None
    }
}

impl fmt::Display for DowntimeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 扩展遥测数据
///
/// 仅由本地仿真生成；远端记录不包含这些字段，对账时按 ID 从旧记录继承。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// 当班操作员
    pub operator: Option<String>,
    /// 转速
    pub rpm: u32,
    /// 振动（mm/s）
    pub vibration: f64,
    /// 设备综合效率（%）
    pub oee: f64,
    /// 停机原因
    pub downtime_cause: DowntimeCause,
}

/// 设备记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// 设备 ID（不可变）
    pub id: DeviceId,

    /// 显示名称
    pub name: String,

    /// 所属产线分区
    pub zone: Zone,

    /// 当前温度读数（°C）
    pub sensor_value: f64,

    /// 运行状态：true 运行，false 停机
    pub status: bool,

    /// 安全上限（°C）
    pub threshold: f64,

    /// 状态描述
    pub message: String,

    /// 最近一次与远端成功对账的时间
    pub last_update: DateTime<Utc>,

    /// 看门狗错误：在线模式下超过窗口未收到新数据
    pub watchdog_error: bool,

    /// 扩展遥测
    #[serde(flatten)]
    pub telemetry: Telemetry,
}

impl DeviceRecord {
    /// 创建停机状态的新设备，读数位于下限
    pub fn new(
        id: impl Into<DeviceId>,
        name: impl Into<String>,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            zone: Zone::for_id(&id),
            id,
            name: name.into(),
            sensor_value: SENSOR_FLOOR_C,
            status: false,
            threshold,
            message: MSG_NORMAL.to_string(),
            last_update: now,
            watchdog_error: false,
            telemetry: Telemetry::default(),
        }
    }

    /// 预警线
    pub fn pre_alarm(&self) -> f64 {
        self.threshold * PRE_ALARM_RATIO
    }

    /// 读数达到或超过安全上限
    pub fn is_critical(&self) -> bool {
        self.sensor_value >= self.threshold
    }

    /// 处于预警区间（未达到上限）
    pub fn is_pre_alarm(&self) -> bool {
        !self.is_critical() && self.sensor_value >= self.pre_alarm()
    }

    /// 超限但仍处于运行状态，联锁应当已经阻止这种情况
    pub fn is_breaching_while_running(&self) -> bool {
        self.status && self.is_critical()
    }

    /// 运行中且距上限不足 20%
    pub fn is_near_limit(&self) -> bool {
        self.status && (self.threshold - self.sensor_value) <= self.threshold * (1.0 - PRE_ALARM_RATIO)
    }

    pub fn status_label(&self) -> &'static str {
        if self.status {
            "ACTIVE"
        } else {
            "STOPPED"
        }
    }

    /// 按毫秒计算距离上次对账的时间
    pub fn millis_since_update(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.last_update).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_from_id() {
        assert_eq!(Zone::for_id(&DeviceId::from("1")), Zone::LineA);
        assert_eq!(Zone::for_id(&DeviceId::from("3")), Zone::LineA);
        assert_eq!(Zone::for_id(&DeviceId::from("4")), Zone::LineB);
        assert_eq!(Zone::for_id(&DeviceId::from("abc")), Zone::LineB);
    }

    #[test]
    fn test_new_device_defaults() {
        let device = DeviceRecord::new("2", "Mixer", 80.0, Utc::now());
        assert_eq!(device.zone, Zone::LineA);
        assert_eq!(device.sensor_value, SENSOR_FLOOR_C);
        assert!(!device.status);
        assert!(!device.watchdog_error);
        assert_eq!(device.telemetry.downtime_cause, DowntimeCause::None);
        assert_eq!(device.pre_alarm(), 64.0);
    }

    #[test]
    fn test_bands() {
        let mut device = DeviceRecord::new("1", "Mixer", 100.0, Utc::now());
        device.sensor_value = 79.9;
        assert!(!device.is_pre_alarm());
        device.sensor_value = 80.0;
        assert!(device.is_pre_alarm());
        assert!(!device.is_critical());
        device.sensor_value = 100.0;
        assert!(device.is_critical());
        assert!(!device.is_pre_alarm());
        assert!(!device.is_breaching_while_running());
        device.status = true;
        assert!(device.is_breaching_while_running());
    }

    #[test]
    fn test_near_limit_requires_running() {
        let mut device = DeviceRecord::new("1", "Mixer", 100.0, Utc::now());
        device.sensor_value = 85.0;
        assert!(!device.is_near_limit());
        device.status = true;
        assert!(device.is_near_limit());
    }

    #[test]
    fn test_telemetry_is_flattened() {
        let mut device = DeviceRecord::new("7", "Packer", 90.0, Utc::now());
        device.telemetry.rpm = 1500;
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["rpm"], 1500);
        assert_eq!(json["zone"], "Line B - Packaging");
        assert_eq!(json["id"], "7");

        let back: DeviceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, device);
    }
}
