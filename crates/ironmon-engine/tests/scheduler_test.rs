use async_trait::async_trait;
use ironmon_device::{DeviceId, SENSOR_FLOOR_C};
use ironmon_engine::{
    EngineError, RecordingAlarmSink, SchedulerConfig, ScriptedRandom, TickOutcome, TickScheduler,
};
use ironmon_gateway::{
    GatewayError, InMemoryRemoteStore, RecordPatch, RemoteRecord, RemoteStore, SyncGateway,
    SyncMode,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 包装内存存储：统计 update 调用次数，可注入延迟、忽略或拒绝写入
struct CountingStore {
    inner: InMemoryRemoteStore,
    update_calls: AtomicUsize,
    list_delay: Option<Duration>,
    ignore_updates: AtomicBool,
    reject_updates: AtomicBool,
}

impl CountingStore {
    fn new(records: Vec<RemoteRecord>) -> Self {
        Self {
            inner: InMemoryRemoteStore::with_records(records),
            update_calls: AtomicUsize::new(0),
            list_delay: None,
            ignore_updates: AtomicBool::new(false),
            reject_updates: AtomicBool::new(false),
        }
    }

    fn slow(records: Vec<RemoteRecord>, delay: Duration) -> Self {
        Self {
            list_delay: Some(delay),
            ..Self::new(records)
        }
    }

    fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for CountingStore {
    /// 先读取再延迟返回，模拟传输途中远端已变化
    async fn list(&self) -> Result<Vec<RemoteRecord>, GatewayError> {
        let records = self.inner.list().await;
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        records
    }

    async fn get(&self, id: &str) -> Result<RemoteRecord, GatewayError> {
        self.inner.get(id).await
    }

    async fn create(&self, patch: &RecordPatch) -> Result<RemoteRecord, GatewayError> {
        self.inner.create(patch).await
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<(), GatewayError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(GatewayError::unavailable("update rejected"));
        }
        if self.ignore_updates.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        self.inner.delete(id).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn mixer(id: &str, value: f64, running: bool, threshold: f64) -> RemoteRecord {
    RemoteRecord::new(id)
        .with_name(&format!("Mixer {}", id))
        .with_value(value)
        .with_status(running)
        .with_threshold(threshold)
}

fn scheduler(store: Arc<CountingStore>) -> TickScheduler {
    TickScheduler::new(SyncGateway::new(store), SchedulerConfig::default())
        .with_rng(Box::new(ScriptedRandom::constant(0.5)))
}

/// 首次拉取为空：使用演示数据，模式 EMPTY
#[tokio::test]
async fn test_bootstrap_empty_remote_seeds_fallback() {
    let store = Arc::new(CountingStore::new(Vec::new()));
    let scheduler = scheduler(store);

    assert_eq!(scheduler.bootstrap().await, SyncMode::Empty);

    let snap = scheduler.latest();
    assert_eq!(snap.mode, SyncMode::Empty);
    assert_eq!(snap.connectivity.text, "REMOTE EMPTY - LOCAL MODE");
    let ids: Vec<&str> = snap.devices.iter().map(|d| d.record.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "4"]);
    assert!(snap.devices.iter().all(|d| !d.record.status));
    assert_eq!(snap.diff.added.len(), 2);
}

/// 运行中接近上限：同一周期联锁停机，推送后的远端也为停机
#[tokio::test]
async fn test_interlock_trips_and_is_pushed() {
    let store = Arc::new(CountingStore::new(vec![mixer("1", 79.0, true, 80.0)]));
    let scheduler = scheduler(store.clone());
    scheduler.bootstrap().await;

    assert_eq!(scheduler.tick().await, TickOutcome::Completed(1));

    let snap = scheduler.latest();
    let device = snap.device("1").unwrap();
    assert!(!device.record.status);
    assert!(device.record.sensor_value >= 80.0);
    assert!(!snap.alarm_active);
    assert_eq!(store.update_calls(), 1);

    let remote = store.inner.get("1").await.unwrap();
    assert_eq!(remote.running(), Some(false));
    assert_eq!(remote.message.as_deref(), Some("SAFE-STOP: limit exceeded"));
}

/// 传输失败：保留缓存，模式 OFFLINE；恢复后回到 ONLINE
#[tokio::test]
async fn test_transport_failure_and_recovery() {
    let store = Arc::new(CountingStore::new(vec![
        mixer("1", 40.0, true, 80.0),
        mixer("2", 30.0, false, 80.0),
    ]));
    let scheduler = scheduler(store.clone());
    assert_eq!(scheduler.bootstrap().await, SyncMode::Online);

    store.inner.set_failing(true);
    scheduler.tick().await;

    let snap = scheduler.latest();
    assert_eq!(snap.mode, SyncMode::Offline);
    assert_eq!(snap.connectivity.text, "OFFLINE (DEMO)");
    assert_eq!(snap.devices.len(), 2);
    assert!(snap.diff.is_empty());
    // 本地仿真继续推进
    assert_eq!(snap.device("1").unwrap().record.sensor_value, 41.25);

    store.inner.set_failing(false);
    let calls_before = store.update_calls();
    scheduler.tick().await;

    // 本地模式下不推送，但会探测远端并恢复在线
    assert_eq!(store.update_calls(), calls_before);
    let snap = scheduler.latest();
    assert_eq!(snap.mode, SyncMode::Online);
    assert!(snap.devices.iter().all(|d| !d.record.watchdog_error));
}

#[tokio::test]
async fn test_concurrent_tick_is_skipped() {
    let store = Arc::new(CountingStore::slow(
        vec![mixer("1", 40.0, true, 80.0)],
        Duration::from_millis(200),
    ));
    let scheduler = scheduler(store);

    let (a, b) = tokio::join!(scheduler.tick(), scheduler.tick());
    assert_eq!(a, TickOutcome::Completed(1));
    assert_eq!(b, TickOutcome::Skipped);

    // 标志在周期结束后释放
    assert_eq!(scheduler.tick().await, TickOutcome::Completed(2));
}

#[tokio::test]
async fn test_history_logged_every_tick_in_both_modes() {
    let store = Arc::new(CountingStore::new(vec![mixer("1", 40.0, true, 80.0)]));
    let scheduler = scheduler(store.clone());
    scheduler.bootstrap().await;

    scheduler.tick().await;
    store.inner.set_failing(true);
    scheduler.tick().await;

    let state = scheduler.state();
    let state = state.read().await;
    assert_eq!(state.mode, SyncMode::Offline);
    let entries = state.logger.export_all(&DeviceId::from("1"));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, "RUNNING");
}

/// 远端仍报告运行且超限（写入被忽略）：告警触发
#[tokio::test]
async fn test_alarm_dispatched_when_remote_reports_breach() {
    let store = Arc::new(CountingStore::new(vec![mixer("1", 95.0, true, 80.0)]));
    store.ignore_updates.store(true, Ordering::SeqCst);
    let sink = Arc::new(RecordingAlarmSink::new());
    let scheduler = scheduler(store).with_sink(sink.clone());
    scheduler.bootstrap().await;

    scheduler.tick().await;

    assert!(scheduler.latest().alarm_active);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].devices, vec![DeviceId::from("1")]);
    assert_eq!(events[0].tick, 1);
}

#[tokio::test]
async fn test_toggle_pushes_only_when_online() {
    let store = Arc::new(CountingStore::new(vec![mixer("1", 30.0, false, 80.0)]));
    store.inner.set_failing(true);
    let scheduler = scheduler(store.clone());
    assert_eq!(scheduler.bootstrap().await, SyncMode::Offline);

    store.inner.set_failing(false);
    assert!(scheduler.toggle(&DeviceId::from("1")).await.unwrap());
    assert_eq!(store.update_calls(), 0);
    let snap = scheduler.latest();
    assert_eq!(snap.device("1").unwrap().record.message, "Manual start");

    assert_eq!(scheduler.resync().await, SyncMode::Online);
    assert!(scheduler.toggle(&DeviceId::from("1")).await.unwrap());
    assert_eq!(store.update_calls(), 1);
    assert_eq!(store.inner.get("1").await.unwrap().running(), Some(true));

    let err = scheduler.toggle(&DeviceId::from("99")).await.unwrap_err();
    assert!(matches!(err, EngineError::Device(_)));
}

#[tokio::test]
async fn test_emergency_stop_all_online() {
    let store = Arc::new(CountingStore::new(vec![
        mixer("1", 40.0, true, 80.0),
        mixer("2", 40.0, true, 80.0),
        mixer("3", 40.0, false, 80.0),
    ]));
    let scheduler = scheduler(store.clone());
    scheduler.bootstrap().await;

    assert_eq!(scheduler.emergency_stop_all().await, 2);
    assert_eq!(store.update_calls(), 3);
    for record in store.inner.snapshot().await {
        assert_eq!(record.running(), Some(false));
        assert_eq!(record.message.as_deref(), Some("EMERGENCY STOP EXECUTED"));
    }
    assert!(scheduler.latest().devices.iter().all(|d| !d.record.status));
}

#[tokio::test]
async fn test_emergency_stop_local_does_not_push() {
    let store = Arc::new(CountingStore::new(Vec::new()));
    let scheduler = scheduler(store.clone());
    scheduler.bootstrap().await;
    scheduler.toggle(&DeviceId::from("1")).await.unwrap();

    assert_eq!(scheduler.emergency_stop_all().await, 1);
    assert_eq!(store.update_calls(), 0);
}

#[tokio::test]
async fn test_admin_operations_online() {
    let store = Arc::new(CountingStore::new(vec![mixer("1", 40.0, false, 80.0)]));
    let scheduler = scheduler(store.clone());
    scheduler.bootstrap().await;

    let id = scheduler.create_device("Packer C1", 75.0).await.unwrap();
    assert_eq!(id, DeviceId::from("2"));
    let snap = scheduler.latest();
    let created = snap.device("2").unwrap();
    assert_eq!(created.record.name, "Packer C1");
    assert_eq!(created.record.threshold, 75.0);
    assert_eq!(created.record.sensor_value, SENSOR_FLOOR_C);
    assert_eq!(snap.diff.added, vec![DeviceId::from("2")]);

    scheduler.edit_device(&id, "Packer C2", 70.0).await.unwrap();
    let remote = store.inner.get("2").await.unwrap();
    assert_eq!(remote.name().as_deref(), Some("Packer C2"));
    assert_eq!(remote.threshold_value(), Some(70.0));

    scheduler.delete_device(&id).await.unwrap();
    let snap = scheduler.latest();
    assert!(snap.device("2").is_none());
    assert_eq!(snap.diff.removed, vec![DeviceId::from("2")]);
}

#[tokio::test]
async fn test_admin_operations_local() {
    let store = Arc::new(CountingStore::new(Vec::new()));
    let scheduler = scheduler(store.clone());
    scheduler.bootstrap().await;

    let id = scheduler.create_device("Line A Mixer", 85.0).await.unwrap();
    assert_eq!(id, DeviceId::from("5"));
    assert!(store.inner.snapshot().await.is_empty());

    scheduler.edit_device(&id, "Line A Mixer 2", 88.0).await.unwrap();
    let snap = scheduler.latest();
    assert_eq!(snap.device("5").unwrap().record.name, "Line A Mixer 2");
    assert_eq!(snap.device("5").unwrap().record.threshold, 88.0);

    scheduler.delete_device(&DeviceId::from("4")).await.unwrap();
    let snap = scheduler.latest();
    let ids: Vec<&str> = snap.devices.iter().map(|d| d.record.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "5"]);
}

#[tokio::test]
async fn test_admin_validation() {
    let store = Arc::new(CountingStore::new(Vec::new()));
    let scheduler = scheduler(store);
    scheduler.bootstrap().await;

    assert!(scheduler.create_device("", 80.0).await.is_err());
    assert!(scheduler.create_device("Mixer", 0.0).await.is_err());
    assert!(scheduler.edit_device(&DeviceId::from("1"), "Mixer", -1.0).await.is_err());
    assert!(scheduler.edit_device(&DeviceId::from("42"), "Mixer", 80.0).await.is_err());
    assert!(scheduler.delete_device(&DeviceId::from("42")).await.is_err());
}

#[tokio::test]
async fn test_spawned_scheduler_publishes_and_shuts_down() {
    let store = Arc::new(CountingStore::new(vec![mixer("1", 40.0, true, 80.0)]));
    let config = SchedulerConfig {
        tick_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let scheduler = Arc::new(
        TickScheduler::new(SyncGateway::new(store), config)
            .with_rng(Box::new(ScriptedRandom::constant(0.1))),
    );
    scheduler.bootstrap().await;

    let mut rx = scheduler.subscribe();
    let handle = scheduler.clone().spawn();

    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            if rx.borrow().tick >= 2 {
                break;
            }
        }
    })
    .await;
    assert!(reached.is_ok());

    handle.shutdown().await;
}

/// 在线时超时的设备进入本地模式后清除看门狗标志
#[tokio::test]
async fn test_watchdog_cleared_after_falling_back_to_local() {
    let store = Arc::new(CountingStore::new(vec![mixer("1", 40.0, true, 80.0)]));
    let scheduler = TickScheduler::new(
        SyncGateway::new(store.clone()).with_staleness_window(1),
        SchedulerConfig::default(),
    )
    .with_rng(Box::new(ScriptedRandom::constant(0.5)));
    scheduler.bootstrap().await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    scheduler.tick().await;
    let snap = scheduler.latest();
    assert_eq!(snap.mode, SyncMode::Online);
    assert!(snap.device("1").unwrap().record.watchdog_error);
    assert_eq!(snap.kpis.stale, 1);

    store.inner.set_failing(true);
    scheduler.tick().await;
    let snap = scheduler.latest();
    assert_eq!(snap.mode, SyncMode::Offline);
    assert!(!snap.device("1").unwrap().record.watchdog_error);
    assert_eq!(snap.kpis.stale, 0);
}

/// 周期网络阶段中的手动启停在周期结束后生效，不被对账覆盖
#[tokio::test]
async fn test_toggle_during_online_tick_is_not_reverted() {
    let store = Arc::new(CountingStore::slow(
        vec![mixer("1", 40.0, true, 80.0)],
        Duration::from_millis(200),
    ));
    let scheduler = scheduler(store.clone());
    scheduler.bootstrap().await;

    let (outcome, toggled) = tokio::join!(scheduler.tick(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.toggle(&DeviceId::from("1")).await
    });
    assert_eq!(outcome, TickOutcome::Completed(1));
    assert!(!toggled.unwrap());

    let snap = scheduler.latest();
    let device = snap.device("1").unwrap();
    assert!(!device.record.status);
    assert_eq!(device.record.message, "Manual stop");
    assert_eq!(store.inner.get("1").await.unwrap().running(), Some(false));

    scheduler.tick().await;
    assert!(!scheduler.latest().device("1").unwrap().record.status);
}

/// 远端拒绝写入：启停仍在本地生效并返回成功
#[tokio::test]
async fn test_toggle_succeeds_when_remote_push_fails() {
    let store = Arc::new(CountingStore::new(vec![mixer("1", 30.0, false, 80.0)]));
    let scheduler = scheduler(store.clone());
    assert_eq!(scheduler.bootstrap().await, SyncMode::Online);

    store.reject_updates.store(true, Ordering::SeqCst);
    assert!(scheduler.toggle(&DeviceId::from("1")).await.unwrap());
    assert_eq!(store.update_calls(), 1);

    let snap = scheduler.latest();
    assert!(snap.device("1").unwrap().record.status);
    assert_eq!(snap.device("1").unwrap().record.message, "Manual start");
    assert_eq!(store.inner.get("1").await.unwrap().running(), Some(false));
}

/// 关闭时等待正在执行的周期结束
#[tokio::test]
async fn test_shutdown_waits_for_in_flight_tick() {
    let store = Arc::new(CountingStore::slow(
        vec![mixer("1", 40.0, true, 80.0)],
        Duration::from_millis(150),
    ));
    let config = SchedulerConfig {
        tick_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let scheduler = Arc::new(
        TickScheduler::new(SyncGateway::new(store), config)
            .with_rng(Box::new(ScriptedRandom::constant(0.5))),
    );
    scheduler.bootstrap().await;

    let handle = scheduler.clone().spawn();
    let started = tokio::time::timeout(Duration::from_secs(5), async {
        while scheduler.tick_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(started.is_ok());

    handle.shutdown().await;

    let ticks = scheduler.tick_count();
    assert_eq!(scheduler.latest().tick, ticks);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(scheduler.tick_count(), ticks);
    assert_eq!(scheduler.latest().tick, ticks);
}
