//! Service registry: the shared table of backend instances.
//!
//! Keeps one `Vec<Arc<ServiceInstance>>` per logical service name inside an
//! `scc::HashMap`, so request-path reads and the background probe loop never
//! contend on a global lock. Instance health lives in atomics on the
//! instance itself; the registry structure only changes on register /
//! deregister.
//!
//! Selection is deterministic first-match: instances keep their registration
//! order and `resolve` returns the first healthy one.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use scc::HashMap;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::{
    endpoint::{Endpoint, EndpointError, InstanceHealth},
    error::{GatewayError, GatewayResult},
};

/// Errors related to registry mutations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RegistryError {
    /// The registration address is not a usable backend base URL
    #[error(transparent)]
    InvalidAddress(#[from] EndpointError),
}

/// A single registered backend instance.
#[derive(Debug)]
pub struct ServiceInstance {
    id: Uuid,
    service: String,
    endpoint: Endpoint,
    health: InstanceHealth,
    registered_at: DateTime<Utc>,
}

impl ServiceInstance {
    fn new(service: &str, address: &str) -> Result<Self, RegistryError> {
        Ok(Self {
            id: Uuid::new_v4(),
            service: service.to_string(),
            endpoint: Endpoint::new(address)?,
            health: InstanceHealth::new(),
            registered_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn health(&self) -> &InstanceHealth {
        &self.health
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }
}

/// Serializable snapshot of one instance, as exposed by `/registry/services`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRecord {
    pub id: Uuid,
    pub service: String,
    pub address: String,
    pub healthy: bool,
    pub registered_at: DateTime<Utc>,
}

impl From<&ServiceInstance> for ServiceRecord {
    fn from(instance: &ServiceInstance) -> Self {
        Self {
            id: instance.id,
            service: instance.service.clone(),
            address: instance.endpoint.as_str().to_string(),
            healthy: instance.health.is_healthy(),
            registered_at: instance.registered_at,
        }
    }
}

/// Concurrent serviceName -> instances table.
pub struct ServiceRegistry {
    services: HashMap<String, Vec<Arc<ServiceInstance>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Seed the registry from the static serviceName -> addresses table.
    pub fn seed(&self, static_services: &std::collections::HashMap<String, Vec<String>>) {
        for (service, addresses) in static_services {
            for address in addresses {
                match self.register(service, address) {
                    Ok(id) => {
                        tracing::info!(
                            "Seeded static instance {} for {} at {}",
                            id,
                            service,
                            address
                        );
                    }
                    Err(e) => {
                        // Validation runs before seeding, so this only fires
                        // for configs loaded without validation.
                        tracing::error!("Skipping invalid static address for {}: {}", service, e);
                    }
                }
            }
        }
    }

    /// Register an instance; returns its id for later deregistration.
    pub fn register(&self, service: &str, address: &str) -> Result<Uuid, RegistryError> {
        let instance = Arc::new(ServiceInstance::new(service, address)?);
        let id = instance.id;

        self.services
            .entry_sync(service.to_string())
            .or_insert_with(Vec::new)
            .get_mut()
            .push(instance);

        Ok(id)
    }

    /// Remove the instance with the given id. Returns false if no such
    /// instance exists. A service whose last instance leaves is removed
    /// from the table entirely.
    pub fn deregister(&self, id: Uuid) -> bool {
        let mut removed = false;
        self.services.retain_sync(|_, instances| {
            if let Some(pos) = instances.iter().position(|i| i.id == id) {
                instances.remove(pos);
                removed = true;
            }
            !instances.is_empty()
        });
        removed
    }

    /// Resolve a service name to a healthy instance.
    ///
    /// First healthy instance in registration order wins. Distinguishes a
    /// never-registered name from one with zero healthy instances; both map
    /// to the same external status.
    pub fn resolve(&self, service: &str) -> GatewayResult<Arc<ServiceInstance>> {
        match self.services.read_sync(&service.to_string(), |_, instances| {
            instances
                .iter()
                .find(|instance| instance.health.is_healthy())
                .cloned()
        }) {
            None => Err(GatewayError::UnknownService(service.to_string())),
            Some(None) => Err(GatewayError::ServiceUnavailable(service.to_string())),
            Some(Some(instance)) => Ok(instance),
        }
    }

    /// All registered instances, for the probe loop and diagnostics.
    pub fn instances(&self) -> Vec<Arc<ServiceInstance>> {
        let mut instances = Vec::new();
        self.services.iter_sync(|_, entry| {
            instances.extend(entry.iter().cloned());
            true
        });
        instances
    }

    /// Snapshot of all instances, sorted for stable output.
    pub fn snapshot(&self) -> Vec<ServiceRecord> {
        let mut records: Vec<ServiceRecord> = self
            .instances()
            .iter()
            .map(|instance| ServiceRecord::from(instance.as_ref()))
            .collect();
        records.sort_by(|a, b| {
            a.service
                .cmp(&b.service)
                .then(a.registered_at.cmp(&b.registered_at))
        });
        records
    }

    /// Total number of registered instances.
    pub fn instance_count(&self) -> usize {
        let mut count = 0;
        self.services.iter_sync(|_, instances| {
            count += instances.len();
            true
        });
        count
    }

    /// Number of currently healthy instances.
    pub fn healthy_instance_count(&self) -> usize {
        let mut count = 0;
        self.services.iter_sync(|_, instances| {
            count += instances
                .iter()
                .filter(|instance| instance.health.is_healthy())
                .count();
            true
        });
        count
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = ServiceRegistry::new();
        registry
            .register("users-service", "http://localhost:8081")
            .unwrap();

        let instance = registry.resolve("users-service").unwrap();
        assert_eq!(instance.service(), "users-service");
        assert_eq!(instance.endpoint().as_str(), "http://localhost:8081");
    }

    #[test]
    fn test_resolve_unknown_service() {
        let registry = ServiceRegistry::new();
        assert!(matches!(
            registry.resolve("ghost-service"),
            Err(GatewayError::UnknownService(_))
        ));
    }

    #[test]
    fn test_resolve_excludes_unhealthy() {
        let registry = ServiceRegistry::new();
        registry
            .register("users-service", "http://localhost:8081")
            .unwrap();

        let instance = registry.resolve("users-service").unwrap();
        instance.health().mark_unhealthy();

        assert!(matches!(
            registry.resolve("users-service"),
            Err(GatewayError::ServiceUnavailable(_))
        ));

        instance.health().mark_healthy();
        assert!(registry.resolve("users-service").is_ok());
    }

    #[test]
    fn test_first_match_in_registration_order() {
        let registry = ServiceRegistry::new();
        registry
            .register("users-service", "http://localhost:8081")
            .unwrap();
        registry
            .register("users-service", "http://localhost:8082")
            .unwrap();

        // First registered instance wins while healthy
        let first = registry.resolve("users-service").unwrap();
        assert_eq!(first.endpoint().as_str(), "http://localhost:8081");

        // Demoting it shifts selection to the next in order
        first.health().mark_unhealthy();
        let second = registry.resolve("users-service").unwrap();
        assert_eq!(second.endpoint().as_str(), "http://localhost:8082");
    }

    #[test]
    fn test_register_rejects_bad_address() {
        let registry = ServiceRegistry::new();
        assert!(registry.register("users-service", "localhost:8081").is_err());
        assert!(
            registry
                .register("users-service", "ftp://localhost:8081")
                .is_err()
        );
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn test_deregister() {
        let registry = ServiceRegistry::new();
        let id = registry
            .register("users-service", "http://localhost:8081")
            .unwrap();

        assert!(registry.deregister(id));
        // Last instance gone: the name is unknown again
        assert!(matches!(
            registry.resolve("users-service"),
            Err(GatewayError::UnknownService(_))
        ));
        // Second deregistration of the same id is a no-op
        assert!(!registry.deregister(id));
    }

    #[test]
    fn test_seed_from_static_table() {
        let registry = ServiceRegistry::new();
        let mut table = std::collections::HashMap::new();
        table.insert(
            "users-service".to_string(),
            vec!["http://localhost:8081".to_string()],
        );
        table.insert(
            "products-service".to_string(),
            vec![
                "http://localhost:8082".to_string(),
                "http://localhost:8083".to_string(),
            ],
        );

        registry.seed(&table);

        assert_eq!(registry.instance_count(), 3);
        assert_eq!(registry.healthy_instance_count(), 3);
        assert!(registry.resolve("users-service").is_ok());
        assert!(registry.resolve("products-service").is_ok());
    }

    #[test]
    fn test_snapshot_is_sorted_and_complete() {
        let registry = ServiceRegistry::new();
        registry
            .register("users-service", "http://localhost:8081")
            .unwrap();
        registry
            .register("products-service", "http://localhost:8082")
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].service, "products-service");
        assert_eq!(snapshot[1].service, "users-service");
        assert!(snapshot.iter().all(|record| record.healthy));
    }
}
