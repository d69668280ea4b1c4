use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::connection::ConnectedInstance;
use super::types::DetachResult;

/// 依赖实例缓存（服务类型 -> 已解析的实例）
///
/// 只由收到的通知填充，从不反查注册表。每个依赖最多一个条目。
#[derive(Debug, Clone, Default)]
pub struct ConnectedInstanceCache {
    instances: Arc<DashMap<String, ConnectedInstance>>,
}

impl ConnectedInstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 仅在条目不存在时插入，返回是否插入成功
    pub fn attach_if_absent(&self, service_type: &str, instance: ConnectedInstance) -> bool {
        match self.instances.entry(service_type.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(instance);
                true
            }
        }
    }

    /// 仅当缓存的 (ip, port) 与给定地址一致时移除
    pub fn detach_if_matches(&self, service_type: &str, ip: &str, port: u16) -> DetachResult {
        if self
            .instances
            .remove_if(service_type, |_, cached| cached.matches(ip, port))
            .is_some()
        {
            DetachResult::Removed
        } else if self.instances.contains_key(service_type) {
            DetachResult::Mismatch
        } else {
            DetachResult::Missing
        }
    }

    pub fn get(&self, service_type: &str) -> Option<ConnectedInstance> {
        self.instances
            .get(service_type)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, service_type: &str) -> bool {
        self.instances.contains_key(service_type)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
