use crate::random::RandomSource;
use ironmon_device::model::{MSG_NORMAL, MSG_SAFE_STOP};
use ironmon_device::{DeviceCache, DeviceId, DeviceRecord, DowntimeCause, SENSOR_FLOOR_C};
use ironmon_gateway::{RecordPatch, RemoteStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 当班操作员名单
pub const SHIFT_OPERATORS: [&str; 4] = ["G. Martinez", "L. Sanchez", "A. Gomez", "R. Lopez"];

const RPM_BASE: u32 = 1450;
const RPM_SPREAD: f64 = 100.0;
const VIBRATION_BASE: f64 = 2.0;
const VIBRATION_SPREAD: f64 = 1.5;
const OEE_BASE: f64 = 85.0;
const OEE_SPREAD: f64 = 10.0;

/// 仿真参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsParams {
    /// 温度下限（°C），低于环境温度时按环境温度处理
    pub floor: f64,
    /// 运行时每周期升温下限
    pub heat_min: f64,
    /// 运行时每周期升温上限
    pub heat_max: f64,
    /// 停机时每周期降温
    pub cooling_rate: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            floor: SENSOR_FLOOR_C,
            heat_min: 0.5,
            heat_max: 2.0,
            cooling_rate: 1.5,
        }
    }
}

/// 一次全量推进的结果
#[derive(Debug, Clone, Default)]
pub struct AdvanceSummary {
    /// 本周期触发安全联锁的设备
    pub interlocked: Vec<DeviceId>,
}

/// 遥测推送结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
}

/// 物理仿真引擎
#[derive(Debug, Clone, Default)]
pub struct PhysicsEngine {
    params: PhysicsParams,
}

impl PhysicsEngine {
    pub fn new(params: PhysicsParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    /// 推进单台设备一个周期
    ///
    /// 升温/降温之后先钳制下限，再判定安全联锁：
    /// 运行中读数达到上限立即强制停机，不会在同一周期自动恢复。
    pub fn advance(&self, mut device: DeviceRecord, rng: &mut dyn RandomSource) -> DeviceRecord {
        let p = &self.params;

        if device.telemetry.operator.is_none() {
            device.telemetry.operator = Some(shift_operator(&device.id).to_string());
        }

        if device.status {
            device.sensor_value += rng.range(p.heat_min, p.heat_max);
            device.telemetry.rpm = RPM_BASE + (rng.next_f64() * RPM_SPREAD).floor() as u32;
            device.telemetry.vibration =
                round_to(VIBRATION_BASE + rng.next_f64() * VIBRATION_SPREAD, 2);
            device.telemetry.oee = round_to(OEE_BASE + rng.next_f64() * OEE_SPREAD, 1);
            device.telemetry.downtime_cause = DowntimeCause::None;
        } else {
            device.sensor_value -= p.cooling_rate;
            zero_mechanics(&mut device);
            if !device.telemetry.downtime_cause.is_recorded() {
                device.telemetry.downtime_cause = if device.sensor_value >= device.threshold {
                    DowntimeCause::OverTemperature
                } else {
                    DowntimeCause::RANDOM_POOL[rng.pick(DowntimeCause::RANDOM_POOL.len())]
                };
            }
        }

        device.sensor_value = device.sensor_value.max(p.floor.max(SENSOR_FLOOR_C));

        if device.status && device.sensor_value >= device.threshold {
            device.status = false;
            device.telemetry.downtime_cause = DowntimeCause::OverTemperature;
            zero_mechanics(&mut device);
        }

        device.message = derive_message(&device);
        device
    }

    /// 推进缓存中的全部设备
    pub fn advance_all(&self, cache: &mut DeviceCache, rng: &mut dyn RandomSource) -> AdvanceSummary {
        let mut summary = AdvanceSummary::default();

        for slot in cache.iter_mut() {
            let was_running = slot.status;
            let next = self.advance(slot.clone(), rng);
            if was_running && !next.status && next.is_critical() {
                warn!(
                    device_id = %next.id,
                    value = next.sensor_value,
                    threshold = next.threshold,
                    "Safety interlock tripped"
                );
                summary.interlocked.push(next.id.clone());
            }
            *slot = next;
        }

        summary
    }

    /// 生成每台设备的遥测推送内容
    pub fn telemetry_patches(cache: &DeviceCache) -> Vec<(DeviceId, RecordPatch)> {
        cache
            .iter()
            .map(|d| {
                (
                    d.id.clone(),
                    RecordPatch::telemetry(&d.name, d.sensor_value, d.status, &d.message),
                )
            })
            .collect()
    }
}

/// 尽力推送遥测；失败只记录日志，本地缓存仍然是权威数据
pub async fn push_telemetry(store: &dyn RemoteStore, patches: &[(DeviceId, RecordPatch)]) -> PushReport {
    let mut report = PushReport::default();

    for (id, patch) in patches {
        match store.update(id.as_str(), patch).await {
            Ok(()) => report.pushed += 1,
            Err(e) => {
                debug!(device_id = %id, error = %e, "Telemetry push failed");
                report.failed += 1;
            }
        }
    }

    if report.failed > 0 {
        warn!(
            pushed = report.pushed,
            failed = report.failed,
            store = store.name(),
            "Some telemetry pushes failed"
        );
    }
    report
}

/// 按 ID 轮换分配操作员
pub fn shift_operator(id: &DeviceId) -> &'static str {
    let n = id
        .as_number()
        .unwrap_or_else(|| id.as_str().bytes().map(u64::from).sum());
    SHIFT_OPERATORS[(n % SHIFT_OPERATORS.len() as u64) as usize]
}

fn derive_message(device: &DeviceRecord) -> String {
    if device.status {
        MSG_NORMAL.to_string()
    } else if device.is_critical() {
        MSG_SAFE_STOP.to_string()
    } else {
        format!("Stopped: {}", device.telemetry.downtime_cause)
    }
}

fn zero_mechanics(device: &mut DeviceRecord) {
    device.telemetry.rpm = 0;
    device.telemetry.vibration = 0.0;
    device.telemetry.oee = 0.0;
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
