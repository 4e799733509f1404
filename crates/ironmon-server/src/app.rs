use anyhow::Result;
use ironmon_config::{AppConfig, RemoteBackend};
use ironmon_engine::{
    PhysicsEngine, PhysicsParams, SchedulerConfig, StdRandom, TickScheduler, WebhookAlarmSink,
};
use ironmon_gateway::{HttpRemoteStore, InMemoryRemoteStore, RemoteStore, SyncGateway};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub fn scheduler_config(config: &AppConfig) -> SchedulerConfig {
    SchedulerConfig {
        tick_interval: Duration::from_millis(config.scheduler.tick_interval_ms),
        probe_remote_in_local: config.scheduler.probe_remote_in_local,
        log_capacity: config.history.capacity,
    }
}

fn remote_store(config: &AppConfig) -> Result<Arc<dyn RemoteStore>> {
    let remote = &config.remote;
    let store: Arc<dyn RemoteStore> = match remote.backend {
        RemoteBackend::Http => {
            let store = HttpRemoteStore::new(
                &remote.base_url,
                &remote.collection,
                remote.request_timeout_ms.map(Duration::from_millis),
            )?;
            info!(url = %store.collection_url(), "Using HTTP remote store");
            Arc::new(store)
        }
        RemoteBackend::Memory => {
            info!("Using in-memory remote store");
            Arc::new(InMemoryRemoteStore::new())
        }
    };
    Ok(store)
}

/// 按配置组装调度器（尚未执行首次同步）
pub fn build_scheduler(config: &AppConfig) -> Result<TickScheduler> {
    let gateway = SyncGateway::new(remote_store(config)?)
        .with_staleness_window(config.scheduler.staleness_window_ms as i64);

    let physics = PhysicsEngine::new(PhysicsParams {
        floor: config.physics.floor,
        heat_min: config.physics.heat_min,
        heat_max: config.physics.heat_max,
        cooling_rate: config.physics.cooling_rate,
    });

    let mut scheduler = TickScheduler::new(gateway, scheduler_config(config))
        .with_physics(physics)
        .with_rng(Box::new(StdRandom::new(config.physics.seed)));

    if let Some(url) = &config.alarm.webhook_url {
        let sink = WebhookAlarmSink::new(
            url.as_str(),
            Duration::from_millis(config.alarm.webhook_timeout_ms),
        )?;
        info!(url = %url, "Alarm webhook enabled");
        scheduler = scheduler.with_sink(Arc::new(sink));
    }

    Ok(scheduler)
}
