pub mod loader;
pub mod settings;

pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use settings::{
    AlarmConfig, AppConfig, HistoryConfig, LoggingConfig, PhysicsConfig, RemoteBackend,
    RemoteConfig, SchedulerSettings, SecurityConfig, ServerConfig,
};
