use chrono::{DateTime, Utc};
use ironmon_device::{DeviceCache, DeviceRecord};

/// 远端不可用且本地缓存为空时使用的演示设备
pub fn fallback_devices(now: DateTime<Utc>) -> Vec<DeviceRecord> {
    vec![
        DeviceRecord::new("1", "Demo Mixer A1", 80.0, now),
        DeviceRecord::new("4", "Packer B1", 90.0, now),
    ]
}

pub fn fallback_cache(now: DateTime<Utc>) -> DeviceCache {
    DeviceCache::from_records(fallback_devices(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironmon_device::{Zone, SENSOR_FLOOR_C};

    #[test]
    fn test_fallback_devices_are_stopped_at_floor() {
        let devices = fallback_devices(Utc::now());
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| !d.status && d.sensor_value == SENSOR_FLOOR_C));
        assert_eq!(devices[0].zone, Zone::LineA);
        assert_eq!(devices[1].zone, Zone::LineB);
    }
}
