use crate::{DeviceError, DeviceId, DeviceRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 设备缓存
///
/// 保留远端列表的顺序，同时维护 ID -> 下标的索引，
/// 对账时按 ID 查找旧记录为 O(1)。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceCache {
    records: Vec<DeviceRecord>,
    index: HashMap<DeviceId, usize>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从记录列表构建缓存；重复 ID 以最后一条为准
    pub fn from_records(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let mut cache = Self::new();
        for record in records {
            cache.upsert(record);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn get_mut(&mut self, id: &DeviceId) -> Option<&mut DeviceRecord> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.records[i]),
            None => None,
        }
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DeviceRecord> {
        self.records.iter_mut()
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    /// 插入或整体替换记录
    pub fn upsert(&mut self, record: DeviceRecord) {
        match self.index.get(&record.id) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// 用整条记录替换已有设备
    pub fn replace(&mut self, record: DeviceRecord) -> Result<()> {
        let slot = self
            .get_mut(&record.id)
            .ok_or_else(|| DeviceError::NotFound(record.id.to_string()))?;
        *slot = record;
        Ok(())
    }

    pub fn remove(&mut self, id: &DeviceId) -> Option<DeviceRecord> {
        let pos = self.index.remove(id)?;
        let removed = self.records.remove(pos);
        self.reindex();
        Some(removed)
    }

    /// 下一个可用的数字 ID（本地模式新增设备时使用）
    pub fn next_numeric_id(&self) -> DeviceId {
        let max = self
            .records
            .iter()
            .filter_map(|r| r.id.as_number())
            .max()
            .unwrap_or(0);
        DeviceId::from(max + 1)
    }

    /// 每个设备当前读数的快照（用于趋势计算）
    pub fn value_snapshot(&self) -> HashMap<DeviceId, f64> {
        self.records
            .iter()
            .map(|r| (r.id.clone(), r.sensor_value))
            .collect()
    }

    /// 按过滤条件列出设备
    pub fn list(&self, filter: &DeviceFilter) -> Vec<DeviceRecord> {
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut devices: Vec<DeviceRecord> = self
            .records
            .iter()
            .filter(|d| match &search {
                Some(q) => d.name.to_lowercase().contains(q.as_str()),
                None => true,
            })
            .filter(|d| match filter.state {
                StateFilter::All => true,
                StateFilter::Active => d.status,
                StateFilter::Alert => d.sensor_value >= d.pre_alarm(),
            })
            .cloned()
            .collect();

        match filter.sort {
            SortOrder::Id => devices.sort_by(|a, b| compare_ids(&a.id, &b.id)),
            SortOrder::TemperatureDesc => devices.sort_by(|a, b| {
                b.sensor_value
                    .partial_cmp(&a.sensor_value)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        }
        devices
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
    }
}

/// 数字 ID 按数值排序，非数字 ID 排在后面并按字典序
fn compare_ids(a: &DeviceId, b: &DeviceId) -> std::cmp::Ordering {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// 两次缓存之间新增与移除的设备
///
/// 展示层据此创建或销毁图表和日志资源。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDiff {
    pub added: Vec<DeviceId>,
    pub removed: Vec<DeviceId>,
}

impl CacheDiff {
    pub fn between(before: &DeviceCache, after: &DeviceCache) -> Self {
        let before_ids: HashSet<&DeviceId> = before.index.keys().collect();
        let after_ids: HashSet<&DeviceId> = after.index.keys().collect();

        let added = after
            .records
            .iter()
            .filter(|r| !before_ids.contains(&r.id))
            .map(|r| r.id.clone())
            .collect();
        let removed = before
            .records
            .iter()
            .filter(|r| !after_ids.contains(&r.id))
            .map(|r| r.id.clone())
            .collect();

        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// 合并同一周期内的多次变化
    pub fn merge(&mut self, other: CacheDiff) {
        for id in other.added {
            if let Some(pos) = self.removed.iter().position(|r| *r == id) {
                self.removed.remove(pos);
            } else if !self.added.contains(&id) {
                self.added.push(id);
            }
        }
        for id in other.removed {
            if let Some(pos) = self.added.iter().position(|a| *a == id) {
                self.added.remove(pos);
            } else if !self.removed.contains(&id) {
                self.removed.push(id);
            }
        }
    }
}

/// 状态过滤
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateFilter {
    #[default]
    All,
    /// 仅运行中
    Active,
    /// 达到预警线及以上
    Alert,
}

/// 排序方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Id,
    TemperatureDesc,
}

/// 设备过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// 名称关键词（不区分大小写）
    pub search: Option<String>,
    #[serde(default)]
    pub state: StateFilter,
    #[serde(default)]
    pub sort: SortOrder,
}
