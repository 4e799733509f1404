use crate::{DeviceCache, DeviceError, DeviceRecord, HistoryLogEntry, Result};
use chrono::{DateTime, Utc};
use std::io::Write;

pub const FLEET_HEADER: [&str; 7] = [
    "ID",
    "Zone",
    "Device",
    "Status",
    "Current_Temperature",
    "Safety_Limit",
    "Alert",
];

pub const DEVICE_LOG_HEADER: [&str; 8] = [
    "Time",
    "Temp",
    "RPM",
    "Vibration",
    "OEE",
    "Status",
    "Downtime_Cause",
    "Operator",
];

/// 车间报表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// 全量数据
    Full,
    /// 交班报表（带标题行）
    Shift,
}

impl ReportKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ReportKind::Full => "IronMonitor_Full_Data.csv",
            ReportKind::Shift => "Shift_End_Report.csv",
        }
    }
}

/// 导出车间设备汇总
pub fn fleet_csv(cache: &DeviceCache, kind: ReportKind, generated_at: DateTime<Utc>) -> Result<String> {
    if cache.is_empty() {
        return Err(DeviceError::no_data("no devices to export"));
    }

    let mut buf = Vec::new();
    if kind == ReportKind::Shift {
        writeln!(
            buf,
            "SHIFT REPORT - GENERATED: {}\n",
            generated_at.format("%Y-%m-%d %H:%M:%S")
        )
        .map_err(csv::Error::from)?;
    }

    let mut writer = new_writer(buf);
    writer.write_record(FLEET_HEADER)?;
    for device in cache.iter() {
        writer.write_record(fleet_row(device))?;
    }
    finish(writer)
}

fn fleet_row(device: &DeviceRecord) -> [String; 7] {
    let alert = if device.sensor_value >= device.pre_alarm() {
        "YES"
    } else {
        "NO"
    };
    [
        device.id.to_string(),
        device.zone.to_string(),
        device.name.replace(',', ""),
        device.status_label().to_string(),
        format!("{:.2}", device.sensor_value),
        device.threshold.to_string(),
        alert.to_string(),
    ]
}

/// 导出单台设备的数据记录
pub fn device_log_csv(
    device_name: &str,
    entries: &[HistoryLogEntry],
    generated_at: DateTime<Utc>,
) -> Result<String> {
    if entries.is_empty() {
        return Err(DeviceError::no_data(format!(
            "no history recorded for {}",
            device_name
        )));
    }

    let mut buf = Vec::new();
    writeln!(buf, "DATA LOG REPORT - {}", device_name.to_uppercase()).map_err(csv::Error::from)?;
    writeln!(buf, "Generated: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S"))
        .map_err(csv::Error::from)?;

    let mut writer = new_writer(buf);
    writer.write_record(DEVICE_LOG_HEADER)?;
    for entry in entries {
        writer.write_record([
            entry.time.format("%H:%M:%S").to_string(),
            format!("{:.1}", entry.temperature),
            entry.rpm.to_string(),
            format!("{:.2}", entry.vibration),
            format!("{:.1}", entry.oee),
            entry.status.clone(),
            entry.downtime_cause.clone(),
            entry.operator.clone(),
        ])?;
    }
    finish(writer)
}

/// 设备日志的下载文件名
///
/// 名称会进入 `Content-Disposition` 头，只保留 ASCII 字母、数字、`-` 与 `_`。
pub fn device_log_file_name(device_name: &str, generated_at: DateTime<Utc>) -> String {
    let slug: String = device_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("Log_{}_{}.csv", slug, generated_at.timestamp_millis())
}

fn new_writer(buf: Vec<u8>) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(buf)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| DeviceError::internal(e.to_string()))
}
