use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// 远端存储类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// REST 集合端点
    #[default]
    Http,
    /// 进程内存储（演示用）
    Memory,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: RemoteBackend,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// 请求超时（毫秒），不设置则使用客户端默认行为
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// 看门狗窗口
    #[serde(default = "default_staleness_window_ms")]
    pub staleness_window_ms: u64,
    /// 本地模式下仍然每个周期探测远端
    #[serde(default = "default_true")]
    pub probe_remote_in_local: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PhysicsConfig {
    #[serde(default = "default_floor")]
    pub floor: f64,
    #[serde(default = "default_heat_min")]
    pub heat_min: f64,
    #[serde(default = "default_heat_max")]
    pub heat_max: f64,
    #[serde(default = "default_cooling_rate")]
    pub cooling_rate: f64,
    /// 随机种子；不设置时使用系统熵
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// 每台设备保留的历史条数
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SecurityConfig {
    #[serde(default = "default_supervisor_pin")]
    pub supervisor_pin: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlarmConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_timeout_ms")]
    pub webhook_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

// 默认值函数
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api/v1".to_string()
}

fn default_collection() -> String {
    "logs".to_string()
}

fn default_tick_interval_ms() -> u64 {
    2000
}

fn default_staleness_window_ms() -> u64 {
    6000
}

fn default_true() -> bool {
    true
}

/// 环境温度，仿真下限不得低于此值
const MIN_SENSOR_FLOOR_C: f64 = 20.0;

fn default_floor() -> f64 {
    MIN_SENSOR_FLOOR_C
}

fn default_heat_min() -> f64 {
    0.5
}

fn default_heat_max() -> f64 {
    2.0
}

fn default_cooling_rate() -> f64 {
    1.5
}

fn default_history_capacity() -> usize {
    500
}

fn default_supervisor_pin() -> String {
    "1234".to_string()
}

fn default_webhook_timeout_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default trait 实现
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: RemoteBackend::default(),
            base_url: default_base_url(),
            collection: default_collection(),
            request_timeout_ms: None,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            staleness_window_ms: default_staleness_window_ms(),
            probe_remote_in_local: true,
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            floor: default_floor(),
            heat_min: default_heat_min(),
            heat_max: default_heat_max(),
            cooling_rate: default_cooling_rate(),
            seed: None,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            supervisor_pin: default_supervisor_pin(),
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_ms: default_webhook_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            remote: RemoteConfig::default(),
            scheduler: SchedulerSettings::default(),
            physics: PhysicsConfig::default(),
            history: HistoryConfig::default(),
            security: SecurityConfig::default(),
            alarm: AlarmConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_interval_ms == 0 {
            return Err(anyhow!("scheduler.tick_interval_ms must be greater than 0"));
        }

        if self.scheduler.staleness_window_ms == 0 {
            return Err(anyhow!("scheduler.staleness_window_ms must be greater than 0"));
        }

        let p = &self.physics;
        if !(p.heat_min.is_finite() && p.heat_max.is_finite() && p.heat_min >= 0.0) {
            return Err(anyhow!("physics heat range must be finite and non-negative"));
        }
        if p.heat_min > p.heat_max {
            return Err(anyhow!(
                "physics.heat_min ({}) cannot be greater than physics.heat_max ({})",
                p.heat_min,
                p.heat_max
            ));
        }
        if !p.floor.is_finite() || !p.cooling_rate.is_finite() || p.cooling_rate < 0.0 {
            return Err(anyhow!("physics.floor and physics.cooling_rate must be finite, cooling_rate non-negative"));
        }
        if p.floor < MIN_SENSOR_FLOOR_C {
            return Err(anyhow!(
                "physics.floor ({}) cannot be below ambient {}",
                p.floor,
                MIN_SENSOR_FLOOR_C
            ));
        }

        if self.history.capacity == 0 {
            return Err(anyhow!("history.capacity must be greater than 0"));
        }

        if self.security.supervisor_pin.trim().is_empty() {
            return Err(anyhow!("security.supervisor_pin must not be empty"));
        }

        if self.remote.backend == RemoteBackend::Http && self.remote.base_url.trim().is_empty() {
            return Err(anyhow!("remote.base_url is required for the http backend"));
        }

        Ok(())
    }

    /// 以 TOML 输出当前生效的配置
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
