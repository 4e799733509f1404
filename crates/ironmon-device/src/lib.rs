pub mod cache;
pub mod error;
pub mod export;
pub mod history;
pub mod model;

pub use cache::{CacheDiff, DeviceCache, DeviceFilter, SortOrder, StateFilter};
pub use error::{DeviceError, Result};
pub use export::{device_log_csv, device_log_file_name, fleet_csv, ReportKind};
pub use history::{DataLogger, HistoryLogEntry, DEFAULT_HISTORY_CAPACITY};
pub use model::{
    DeviceId, DeviceRecord, DowntimeCause, Telemetry, Zone, DEFAULT_THRESHOLD_C, PRE_ALARM_RATIO,
    SENSOR_FLOOR_C, STALENESS_WINDOW_MS,
};
