pub mod control;
pub mod error;
pub mod health;
pub mod notify;
pub mod physics;
pub mod random;
pub mod scheduler;
pub mod snapshot;
pub mod state;

pub use error::{EngineError, Result};
pub use health::{FleetKpis, HealthMonitor, HealthReport, LevelBand, Trend, TrendDirection};
pub use notify::{AlarmEvent, AlarmSink, LogAlarmSink, RecordingAlarmSink, WebhookAlarmSink};
pub use physics::{push_telemetry, shift_operator, AdvanceSummary, PhysicsEngine, PhysicsParams, PushReport};
pub use random::{RandomSource, ScriptedRandom, StdRandom};
pub use scheduler::{SchedulerConfig, SchedulerHandle, TickOutcome, TickScheduler};
pub use snapshot::{DashboardSnapshot, DeviceView};
pub use state::MonitorState;
