//! 手动操作：启停、紧急停机与设备增删改
//!
//! 在周期之外执行，先取得与周期共用的同步锁，再持有状态写锁整条更新记录；
//! 启停与紧急停机在线时尽力推送远端，失败只记录日志；
//! 增删改在线时先写远端再重新同步，远端错误直接返回给调用方。

use crate::error::{EngineError, Result};
use crate::scheduler::TickScheduler;
use chrono::Utc;
use ironmon_device::model::{MSG_EMERGENCY_STOP, MSG_MANUAL_START, MSG_MANUAL_STOP, MSG_REGISTERED};
use ironmon_device::{CacheDiff, DeviceId, DeviceRecord, DowntimeCause, SENSOR_FLOOR_C};
use ironmon_gateway::{RecordPatch, SyncMode};
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

fn validate(name: &str, threshold: f64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(EngineError::validation("device name must not be empty"));
    }
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(EngineError::validation(format!(
            "threshold must be a positive number, got {}",
            threshold
        )));
    }
    Ok(())
}

impl TickScheduler {
    /// 切换设备启停，返回新的运行状态
    ///
    /// 本地状态先生效；在线时推送远端失败不影响返回值，下一次对账以远端为准。
    pub async fn toggle(&self, id: &DeviceId) -> Result<bool> {
        let _sync = self.sync_lock.lock().await;
        let (status, mode) = {
            let mut state = self.state.write().await;
            let mode = state.mode;
            let device = state
                .cache
                .get_mut(id)
                .ok_or_else(|| EngineError::not_found(id))?;

            device.status = !device.status;
            device.message = if device.status {
                device.telemetry.downtime_cause = DowntimeCause::None;
                MSG_MANUAL_START
            } else {
                MSG_MANUAL_STOP
            }
            .to_string();
            let status = device.status;

            self.republish(&mut state);
            (status, mode)
        };

        info!(device_id = %id, running = status, "Manual toggle");

        if mode == SyncMode::Online {
            let message = if status { MSG_MANUAL_START } else { MSG_MANUAL_STOP };
            if let Err(e) = self
                .gateway
                .store()
                .update(id.as_str(), &RecordPatch::status(status, message))
                .await
            {
                warn!(device_id = %id, error = %e, "Manual toggle push failed");
            }
        }
        Ok(status)
    }

    /// 停止所有运行中的设备，返回被停止的数量
    ///
    /// 在线时向每台设备推送停机指令，单台失败只记录日志。
    pub async fn emergency_stop_all(&self) -> usize {
        let _sync = self.sync_lock.lock().await;
        let (stopped, mode, ids) = {
            let mut state = self.state.write().await;
            let mut stopped = 0;
            for device in state.cache.iter_mut() {
                if device.status {
                    device.status = false;
                    device.message = MSG_EMERGENCY_STOP.to_string();
                    stopped += 1;
                }
            }
            let mode = state.mode;
            let ids = state.cache.ids();
            self.republish(&mut state);
            (stopped, mode, ids)
        };

        warn!(stopped, "EMERGENCY STOP executed");

        if mode == SyncMode::Online {
            let patch = RecordPatch::status(false, MSG_EMERGENCY_STOP);
            for id in &ids {
                if let Err(e) = self.gateway.store().update(id.as_str(), &patch).await {
                    debug!(device_id = %id, error = %e, "Emergency stop push failed");
                }
            }
        }
        stopped
    }

    /// 注册新设备，返回其 ID
    pub async fn create_device(&self, name: &str, threshold: f64) -> Result<DeviceId> {
        validate(name, threshold)?;
        let name = name.trim();
        let _sync = self.sync_lock.lock().await;

        if self.mode().await == SyncMode::Online {
            let patch = RecordPatch {
                device_id: Some(name.to_string()),
                value: Some(SENSOR_FLOOR_C),
                status: Some(false),
                threshold: Some(threshold),
                message: Some(MSG_REGISTERED.to_string()),
            };
            let created = self.gateway.store().create(&patch).await?;
            let id = DeviceId::from(created.id.as_str());
            info!(device_id = %id, name, "Device registered remotely");
            self.resync_locked().await;
            return Ok(id);
        }

        let mut state = self.state.write().await;
        let id = state.cache.next_numeric_id();
        let mut record = DeviceRecord::new(id.clone(), name, threshold, Utc::now());
        record.message = MSG_REGISTERED.to_string();
        state.cache.upsert(record);
        state.record_diff(CacheDiff {
            added: vec![id.clone()],
            removed: Vec::new(),
        });
        self.republish(&mut state);

        info!(device_id = %id, name, "Device registered locally");
        Ok(id)
    }

    /// 修改名称与安全上限
    pub async fn edit_device(&self, id: &DeviceId, name: &str, threshold: f64) -> Result<()> {
        validate(name, threshold)?;
        let name = name.trim();
        let _sync = self.sync_lock.lock().await;

        let mode = {
            let state = self.state.read().await;
            if !state.cache.contains(id) {
                return Err(EngineError::not_found(id));
            }
            state.mode
        };

        if mode == SyncMode::Online {
            let patch = RecordPatch {
                device_id: Some(name.to_string()),
                threshold: Some(threshold),
                ..Default::default()
            };
            self.gateway.store().update(id.as_str(), &patch).await?;
            self.resync_locked().await;
        } else {
            let mut state = self.state.write().await;
            let mut record = state
                .cache
                .get(id)
                .cloned()
                .ok_or_else(|| EngineError::not_found(id))?;
            record.name = name.to_string();
            record.threshold = threshold;
            state.cache.replace(record)?;
            self.republish(&mut state);
        }

        info!(device_id = %id, name, threshold, "Device updated");
        Ok(())
    }

    pub async fn delete_device(&self, id: &DeviceId) -> Result<()> {
        let _sync = self.sync_lock.lock().await;
        let mode = {
            let state = self.state.read().await;
            if !state.cache.contains(id) {
                return Err(EngineError::not_found(id));
            }
            state.mode
        };

        if mode == SyncMode::Online {
            self.gateway.store().delete(id.as_str()).await?;
            self.resync_locked().await;
        } else {
            let mut state = self.state.write().await;
            if state.cache.remove(id).is_none() {
                return Err(EngineError::not_found(id));
            }
            state.record_diff(CacheDiff {
                added: Vec::new(),
                removed: vec![id.clone()],
            });
            self.republish(&mut state);
        }

        info!(device_id = %id, "Device deleted");
        Ok(())
    }

    /// 立即拉取并对账（不推进仿真）
    pub async fn resync(&self) -> SyncMode {
        let _sync = self.sync_lock.lock().await;
        self.resync_locked().await
    }

    /// 调用方已持有同步锁
    async fn resync_locked(&self) -> SyncMode {
        let fetched = self.gateway.fetch().await;
        let now = Utc::now();

        let mut state = self.state.write().await;
        let previous = std::mem::take(&mut state.cache);
        let outcome = self.gateway.reconcile(previous, fetched, now);
        state.apply_outcome(outcome);
        self.republish(&mut state);
        state.mode
    }

    fn republish(&self, state: &mut crate::state::MonitorState) {
        let tick = self.ticks.load(Ordering::SeqCst);
        self.publish(state, tick, Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate("Mixer", 80.0).is_ok());
        assert!(validate("  ", 80.0).is_err());
        assert!(validate("Mixer", 0.0).is_err());
        assert!(validate("Mixer", -5.0).is_err());
        assert!(validate("Mixer", f64::NAN).is_err());
        assert!(validate("Mixer", f64::INFINITY).is_err());
    }
}
