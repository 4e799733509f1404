use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ironmon_device::DeviceId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

/// 告警事件
///
/// 告警无状态：只要有运行中设备超限，每个周期都会产生一次。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    /// 运行中且超限的设备
    pub devices: Vec<DeviceId>,
}

impl AlarmEvent {
    pub fn title(&self) -> String {
        format!("Over-limit alarm on {} device(s)", self.devices.len())
    }
}

/// 告警接收端
#[async_trait]
pub trait AlarmSink: Send + Sync {
    async fn raise(&self, event: &AlarmEvent) -> Result<()>;

    fn name(&self) -> &str;
}

/// 写入日志的告警端（默认启用）
pub struct LogAlarmSink;

#[async_trait]
impl AlarmSink for LogAlarmSink {
    async fn raise(&self, event: &AlarmEvent) -> Result<()> {
        let ids: Vec<&str> = event.devices.iter().map(|id| id.as_str()).collect();
        warn!(tick = event.tick, devices = ?ids, "ALARM: device over safety limit while running");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// 以 JSON POST 到指定地址的告警端
pub struct WebhookAlarmSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlarmSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl AlarmSink for WebhookAlarmSink {
    async fn raise(&self, event: &AlarmEvent) -> Result<()> {
        let body = serde_json::json!({
            "title": event.title(),
            "tick": event.tick,
            "timestamp": event.timestamp,
            "devices": event.devices,
        });

        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("webhook returned status {}", response.status());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// 记录收到的事件，供测试断言
#[derive(Default)]
pub struct RecordingAlarmSink {
    events: Mutex<Vec<AlarmEvent>>,
}

impl RecordingAlarmSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlarmEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AlarmSink for RecordingAlarmSink {
    async fn raise(&self, event: &AlarmEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// 依次投递到所有告警端，单个失败不影响其他端
pub async fn dispatch(sinks: &[Arc<dyn AlarmSink>], event: &AlarmEvent) {
    for sink in sinks {
        if let Err(e) = sink.raise(event).await {
            error!("Alarm dispatch failed via {}: {}", sink.name(), e);
        }
    }
}
