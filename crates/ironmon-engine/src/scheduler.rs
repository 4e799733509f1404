use crate::health::{HealthMonitor, HealthReport};
use crate::notify::{dispatch, AlarmEvent, AlarmSink, LogAlarmSink};
use crate::physics::{push_telemetry, PhysicsEngine};
use crate::random::{RandomSource, StdRandom};
use crate::snapshot::DashboardSnapshot;
use crate::state::MonitorState;
use chrono::{DateTime, Utc};
use ironmon_device::DEFAULT_HISTORY_CAPACITY;
use ironmon_gateway::{SyncGateway, SyncMode};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 调度参数
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// 本地模式下是否每个周期探测远端，以便自动恢复在线
    pub probe_remote_in_local: bool,
    pub log_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(2000),
            probe_remote_in_local: true,
            log_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(u64),
    /// 上一个周期尚未结束
    Skipped,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 周期调度器
///
/// 每个周期依次执行：记录读数 -> 仿真 ->（在线）推送 -> 拉取对账 ->
/// 健康检查 -> 写历史 -> 告警 -> 发布快照。同一时间最多一个周期在执行。
///
/// 周期与手动操作共用 `sync_lock`：从仿真到对账完成之间不会插入手动操作，
/// 手动操作期间周期等待。
pub struct TickScheduler {
    pub(crate) state: Arc<RwLock<MonitorState>>,
    pub(crate) gateway: Arc<SyncGateway>,
    physics: PhysicsEngine,
    pub(crate) health: HealthMonitor,
    sinks: Vec<Arc<dyn AlarmSink>>,
    rng: Mutex<Box<dyn RandomSource>>,
    config: SchedulerConfig,
    pub(crate) ticks: AtomicU64,
    in_flight: AtomicBool,
    pub(crate) sync_lock: AsyncMutex<()>,
    pub(crate) snapshot_tx: watch::Sender<DashboardSnapshot>,
}

pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }

    pub fn abort(self) {
        self.join_handle.abort();
    }
}

impl TickScheduler {
    pub fn new(gateway: SyncGateway, config: SchedulerConfig) -> Self {
        let health = HealthMonitor::new(gateway.staleness_window_ms(), config.tick_interval);
        let (snapshot_tx, _) = watch::channel(DashboardSnapshot::connecting(Utc::now()));

        Self {
            state: Arc::new(RwLock::new(MonitorState::new(config.log_capacity))),
            gateway: Arc::new(gateway),
            physics: PhysicsEngine::default(),
            health,
            sinks: vec![Arc::new(LogAlarmSink)],
            rng: Mutex::new(Box::new(StdRandom::from_entropy())),
            config,
            ticks: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            sync_lock: AsyncMutex::new(()),
            snapshot_tx,
        }
    }

    pub fn with_physics(mut self, physics: PhysicsEngine) -> Self {
        self.physics = physics;
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// 追加告警端（日志告警端始终保留）
    pub fn with_sink(mut self, sink: Arc<dyn AlarmSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn state(&self) -> Arc<RwLock<MonitorState>> {
        self.state.clone()
    }

    pub fn gateway(&self) -> &SyncGateway {
        &self.gateway
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn latest(&self) -> DashboardSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub async fn mode(&self) -> SyncMode {
        self.state.read().await.mode
    }

    /// 已开始的周期数
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// 启动前的首次拉取与对账
    pub async fn bootstrap(&self) -> SyncMode {
        let _sync = self.sync_lock.lock().await;
        let fetched = self.gateway.fetch().await;
        let now = Utc::now();

        let mut state = self.state.write().await;
        let previous = std::mem::take(&mut state.cache);
        let outcome = self.gateway.reconcile(previous, fetched, now);
        state.apply_outcome(outcome);
        state.capture_last_values();

        let mode = state.mode;
        info!(mode = %mode, devices = state.cache.len(), "Bootstrap sync completed");

        self.publish(&mut state, 0, now);
        mode
    }

    /// 执行一个周期；已有周期在执行时直接跳过
    pub async fn tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Tick skipped: previous tick still in flight");
            return TickOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);
        let _sync = self.sync_lock.lock().await;
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;

        // 仿真
        let (mode, patches) = {
            let mut state = self.state.write().await;
            state.capture_last_values();

            let summary = {
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                self.physics.advance_all(&mut state.cache, rng.as_mut())
            };
            if !summary.interlocked.is_empty() {
                info!(tick, count = summary.interlocked.len(), "Interlock stopped devices");
            }

            let mode = state.mode;
            if mode.is_local() {
                state.stamp_local(Utc::now());
                (mode, Vec::new())
            } else {
                (mode, PhysicsEngine::telemetry_patches(&state.cache))
            }
        };

        // 网络阶段，不持有状态锁
        if !patches.is_empty() {
            push_telemetry(self.gateway.store().as_ref(), &patches).await;
        }
        let fetched = if mode.is_local() && !self.config.probe_remote_in_local {
            None
        } else {
            Some(self.gateway.fetch().await)
        };

        let now = Utc::now();
        let (report, snapshot) = {
            let mut state = self.state.write().await;
            if let Some(fetched) = fetched {
                let previous = std::mem::take(&mut state.cache);
                let outcome = self.gateway.reconcile(previous, fetched, now);
                state.apply_outcome(outcome);
            }
            let report = self.evaluate(&mut state, now);
            state.log_tick(now);
            let snapshot = self.snapshot(&mut state, &report, tick, now);
            (report, snapshot)
        };

        if report.alarm_active {
            let event = AlarmEvent {
                tick,
                timestamp: now,
                devices: report.breaching,
            };
            dispatch(&self.sinks, &event).await;
        }
        self.snapshot_tx.send_replace(snapshot);

        debug!(tick, mode = %mode, "Tick completed");
        TickOutcome::Completed(tick)
    }

    fn evaluate(&self, state: &mut MonitorState, now: DateTime<Utc>) -> HealthReport {
        let mode = state.mode;
        self.health.evaluate(&mut state.cache, mode, now)
    }

    fn snapshot(
        &self,
        state: &mut MonitorState,
        report: &HealthReport,
        tick: u64,
        now: DateTime<Utc>,
    ) -> DashboardSnapshot {
        let diff = state.take_diff();
        DashboardSnapshot::build(tick, now, state, report, &self.health, diff)
    }

    /// 周期之外的状态变化（启动、手动操作）后立即发布快照；调用方持有写锁
    pub(crate) fn publish(&self, state: &mut MonitorState, tick: u64, now: DateTime<Utc>) {
        let report = self.evaluate(state, now);
        let snapshot = self.snapshot(state, &report, tick, now);
        self.snapshot_tx.send_replace(snapshot);
    }

    /// 启动后台周期任务
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join_handle = tokio::spawn(async move {
            let mut ticker = interval(self.config.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // 首个 tick 立即完成，跳过以保持间隔
            ticker.tick().await;

            info!(interval_ms = self.config.tick_interval.as_millis() as u64, "Tick scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // 在本任务内执行，关闭时等待当前周期结束
                        self.tick().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Tick scheduler stopped");
        });

        SchedulerHandle {
            shutdown_tx,
            join_handle,
        }
    }
}
