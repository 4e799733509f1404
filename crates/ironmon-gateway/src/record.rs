use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 远端存储中的原始记录
///
/// 形如 `{id, deviceId, value, status, threshold, message}`。
/// 远端接口对类型并不严格：数值字段可能是数字也可能是字符串。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,

    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RemoteRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.device_id = Some(Value::from(name));
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(Value::from(value));
        self
    }

    pub fn with_status(mut self, status: bool) -> Self {
        self.status = Some(Value::from(status));
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(Value::from(threshold));
        self
    }

    /// 设备名称（`deviceId` 字段）
    pub fn name(&self) -> Option<String> {
        match self.device_id.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 温度读数；缺失、无法解析或为 0 时返回 None
    pub fn sensor_value(&self) -> Option<f64> {
        parse_number(self.value.as_ref()).filter(|v| *v != 0.0)
    }

    /// 安全上限；只接受正数
    pub fn threshold_value(&self) -> Option<f64> {
        parse_number(self.threshold.as_ref()).filter(|v| *v > 0.0)
    }

    /// 运行状态；缺失时为 None
    pub fn running(&self) -> Option<bool> {
        match self.status.as_ref()? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            _ => None,
        }
    }

    /// 应用局部更新（内存存储使用）
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(name) = &patch.device_id {
            self.device_id = Some(Value::from(name.as_str()));
        }
        if let Some(value) = patch.value {
            self.value = Some(Value::from(value));
        }
        if let Some(status) = patch.status {
            self.status = Some(Value::from(status));
        }
        if let Some(threshold) = patch.threshold {
            self.threshold = Some(Value::from(threshold));
        }
        if let Some(message) = &patch.message {
            self.message = Some(message.clone());
        }
    }
}

fn parse_number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid record id: {}",
            other
        ))),
    }
}

/// 对远端记录的局部更新（PUT / POST 请求体）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecordPatch {
    /// 每个周期推送的遥测数据
    pub fn telemetry(name: &str, value: f64, status: bool, message: &str) -> Self {
        Self {
            device_id: Some(name.to_string()),
            value: Some(value),
            status: Some(status),
            message: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// 仅更新运行状态
    pub fn status(status: bool, message: &str) -> Self {
        Self {
            status: Some(status),
            message: Some(message.to_string()),
            ..Default::default()
        }
    }
}
