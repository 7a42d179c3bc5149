//! Core gateway orchestration service.
//!
//! The `GatewayService` aggregates immutable configuration (`ServerConfig`)
//! with the shared service registry. Per request it runs the pure pipeline
//! `Parsed -> Resolved`, producing a [`ResolvedTarget`] the HTTP adapter
//! then forwards. This layer deliberately avoids I/O and only manipulates
//! in-memory data so it remains fast and easily testable in isolation.
use std::sync::Arc;

use crate::{
    config::{HealthCheckConfig, ServerConfig},
    core::{
        endpoint::Endpoint,
        error::GatewayResult,
        registry::ServiceRegistry,
        router::PathRouter,
    },
};

/// Where a single request is going: derived per request, never persisted.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// Logical service name the request resolved to
    pub service: String,
    /// Base URL of the selected instance
    pub endpoint: Endpoint,
    /// Path to request from the backend (prefix and service token stripped)
    pub forward_path: String,
}

impl ResolvedTarget {
    /// Full backend URL for this request, without query string.
    pub fn url(&self) -> String {
        self.endpoint.join(&self.forward_path)
    }
}

/// Central orchestrator composing the path router and the service registry.
/// An instance is cheap to clone (Arc inside).
pub struct GatewayService {
    config: Arc<ServerConfig>,
    router: PathRouter,
    registry: Arc<ServiceRegistry>,
}

impl GatewayService {
    /// Create a gateway service, seeding the registry from the static
    /// service table in the configuration.
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let registry = Arc::new(ServiceRegistry::new());
        registry.seed(&config.static_services);
        Self::with_registry(config, registry)
    }

    /// Create a gateway service around an existing registry.
    pub fn with_registry(config: Arc<ServerConfig>, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            router: PathRouter::new(&config.routing),
            config,
            registry,
        }
    }

    /// Plan a request: parse the inbound path, then resolve the service to
    /// a healthy instance. Pure lookup, the caller performs the forward.
    pub fn plan(&self, path: &str) -> GatewayResult<ResolvedTarget> {
        let parsed = self.router.parse(path)?;
        let instance = self.registry.resolve(&parsed.service)?;

        Ok(ResolvedTarget {
            service: parsed.service,
            endpoint: instance.endpoint().clone(),
            forward_path: parsed.forward_path,
        })
    }

    /// Access the shared registry (registration surface, probe loop, diagnostics).
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Return the global health check configuration.
    pub fn health_config(&self) -> &HealthCheckConfig {
        &self.config.health_check
    }

    /// Resolve the health probe path for a service (per-service override or global default).
    pub fn service_health_path(&self, service: &str) -> String {
        self.config
            .service_health_paths
            .get(service)
            .cloned()
            .unwrap_or_else(|| self.config.health_check.path.clone())
    }

    /// Access the full server configuration.
    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }
}
