use ironmon_engine::TickScheduler;
use std::sync::Arc;

/// API 应用状态
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<TickScheduler>,
    /// 主管操作所需的 PIN
    pub supervisor_pin: Arc<str>,
}

impl AppState {
    pub fn new(scheduler: Arc<TickScheduler>, supervisor_pin: &str) -> Self {
        Self {
            scheduler,
            supervisor_pin: Arc::from(supervisor_pin),
        }
    }
}
