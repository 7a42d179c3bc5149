//! Configuration data structures for Portico.
//!
//! These types map directly to YAML (also JSON / TOML) configuration files. They are
//! intentionally serde‑friendly and include defaults so that minimal configs remain concise.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How inbound paths are mapped onto logical service names.
///
/// A request path must look like `/<prefix>/<service-token>/<rest...>`; the
/// logical service name is `<service-token>` with `service_suffix` appended
/// (so `/api/users/42` targets `users-service` by default).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RoutingConfig {
    /// Leading path segment that marks proxied requests (without slashes)
    pub prefix: String,
    /// Suffix appended to the service token to form the registry name
    pub service_suffix: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            prefix: "api".to_string(),
            service_suffix: "-service".to_string(),
        }
    }
}

/// Controls the dynamic registration surface (`/registry/register` etc.).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Whether backends may register/deregister themselves at runtime
    pub enabled: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Static serviceName -> base URLs table, seeded into the registry at startup
    #[serde(default)]
    pub static_services: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    /// Optional per-service health probe path override (serviceName -> path)
    #[serde(default)]
    pub service_health_paths: HashMap<String, String>,
    /// Overall timeout applied to a forwarded request, in seconds (no timeout if absent)
    #[serde(default)]
    pub forward_timeout_secs: Option<u64>,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            routing: RoutingConfig::default(),
            static_services: HashMap::new(),
            registration: RegistrationConfig::default(),
            health_check: HealthCheckConfig::default(),
            service_health_paths: HashMap::new(),
            forward_timeout_secs: None,
        }
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    listen_addr: Option<String>,
    routing: Option<RoutingConfig>,
    static_services: HashMap<String, Vec<String>>,
    registration_enabled: Option<bool>,
    health_check: Option<HealthCheckConfig>,
    service_health_paths: HashMap<String, String>,
    forward_timeout_secs: Option<u64>,
}

impl ServerConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the path routing convention
    pub fn routing(mut self, config: RoutingConfig) -> Self {
        self.routing = Some(config);
        self
    }

    /// Add a statically configured service with the given base URLs
    pub fn service(
        mut self,
        name: impl Into<String>,
        addresses: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.static_services
            .entry(name.into())
            .or_default()
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Enable or disable the dynamic registration surface
    pub fn registration_enabled(mut self, enabled: bool) -> Self {
        self.registration_enabled = Some(enabled);
        self
    }

    /// Set health check configuration
    pub fn health_check(mut self, config: HealthCheckConfig) -> Self {
        self.health_check = Some(config);
        self
    }

    /// Add a service-specific health probe path
    pub fn service_health_path(
        mut self,
        service: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.service_health_paths
            .insert(service.into(), path.into());
        self
    }

    /// Set the overall forward timeout in seconds
    pub fn forward_timeout_secs(mut self, secs: u64) -> Self {
        self.forward_timeout_secs = Some(secs);
        self
    }

    /// Build the final ServerConfig
    pub fn build(self) -> Result<ServerConfig, String> {
        let listen_addr = self
            .listen_addr
            .ok_or_else(|| "listen_addr is required".to_string())?;

        Ok(ServerConfig {
            listen_addr,
            routing: self.routing.unwrap_or_default(),
            static_services: self.static_services,
            registration: RegistrationConfig {
                enabled: self.registration_enabled.unwrap_or(true),
            },
            health_check: self.health_check.unwrap_or_default(),
            service_health_paths: self.service_health_paths,
            forward_timeout_secs: self.forward_timeout_secs,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub path: String,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 1,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[serde(rename = "healthy")]
    Healthy,
    #[serde(rename = "unhealthy")]
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}
