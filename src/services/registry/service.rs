use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::types::{RegistrationRecord, RegistryError};

/// 内存服务注册表
///
/// 所有读写都经过同一把互斥锁；对外只返回记录的副本，内部存储从不以引用形式泄露。
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<Mutex<Vec<RegistrationRecord>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册服务实例，返回带有新分配 id 的记录
    pub async fn register(
        &self,
        mut registration: RegistrationRecord,
    ) -> Result<RegistrationRecord, RegistryError> {
        if registration.service_type.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "service type must not be empty".to_string(),
            ));
        }

        if registration.depends_on(&registration.service_type) {
            return Err(RegistryError::InvalidArgument(format!(
                "service '{}' cannot depend on itself",
                registration.service_type
            )));
        }

        let mut services = self.services.lock().await;

        if services.iter().any(|existing| existing.same_instance(&registration)) {
            return Err(RegistryError::DuplicateRegistration {
                service_type: registration.service_type,
                ip: registration.ip,
                port: registration.port,
            });
        }

        let mut id = Uuid::new_v4().to_string();
        while services.iter().any(|existing| existing.id == id) {
            id = Uuid::new_v4().to_string();
        }
        registration.id = id;

        services.push(registration.clone());

        tracing::info!(
            id = %registration.id,
            service_type = %registration.service_type,
            address = %registration.address(),
            total = services.len(),
            "Registered service instance"
        );

        Ok(registration)
    }

    /// 按 id 注销服务实例，返回被移除的记录
    pub async fn deregister(&self, id: &str) -> Result<RegistrationRecord, RegistryError> {
        if id.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "service id must not be empty".to_string(),
            ));
        }

        let mut services = self.services.lock().await;

        let Some(index) = services.iter().position(|existing| existing.id == id) else {
            return Err(RegistryError::NotFound(id.to_string()));
        };

        // Vec::remove 保持剩余记录的相对顺序
        let removed = services.remove(index);

        tracing::info!(
            id = %removed.id,
            service_type = %removed.service_type,
            address = %removed.address(),
            total = services.len(),
            "Deregistered service instance"
        );

        Ok(removed)
    }

    pub async fn list_all(&self) -> Vec<RegistrationRecord> {
        self.services.lock().await.clone()
    }

    pub async fn list_by_type(
        &self,
        service_type: &str,
    ) -> Result<Vec<RegistrationRecord>, RegistryError> {
        if service_type.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "service type must not be empty".to_string(),
            ));
        }

        let services = self.services.lock().await;
        Ok(services
            .iter()
            .filter(|existing| existing.service_type == service_type)
            .cloned()
            .collect())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<RegistrationRecord, RegistryError> {
        let services = self.services.lock().await;
        services
            .iter()
            .find(|existing| existing.id == id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// 查找所有声明依赖指定服务类型的实例（通知扇出的目标）
    pub async fn find_dependents(&self, service_type: &str) -> Vec<RegistrationRecord> {
        let services = self.services.lock().await;
        services
            .iter()
            .filter(|existing| existing.depends_on(service_type))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.services.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.services.lock().await.is_empty()
    }
}
