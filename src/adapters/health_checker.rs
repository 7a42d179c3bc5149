use std::{sync::Arc, time::Duration};

use eyre::Result;
use tokio::time::sleep;

use crate::{
    config::{HealthCheckConfig, HealthStatus},
    core::{GatewayService, registry::ServiceInstance},
    ports::http_client::HttpClient,
};

/// Background probe loop keeping registry instance health fresh.
///
/// Runs independently of request handling: it reads the instance list from
/// the registry, probes each instance's health path with a bounded timeout,
/// and flips health state only when the configured consecutive-failure /
/// consecutive-success thresholds are crossed. Resolution never waits on
/// this loop; it reads the same atomics the loop writes.
pub struct HealthChecker {
    gateway_service: Arc<GatewayService>,
    http_client: Arc<dyn HttpClient>,
}

impl HealthChecker {
    pub fn new(gateway_service: Arc<GatewayService>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            gateway_service,
            http_client,
        }
    }

    /// Run the health checker loop
    pub async fn run(&self) -> Result<()> {
        let health_config = self.gateway_service.health_config();

        if !health_config.enabled {
            tracing::info!("Health checking is disabled");
            return Ok(());
        }

        let interval = Duration::from_secs(health_config.interval_secs);
        let timeout_secs = health_config.timeout_secs;

        tracing::info!(
            "Starting health checker with interval: {}s, timeout: {}s, default path: {}",
            health_config.interval_secs,
            health_config.timeout_secs,
            health_config.path
        );

        loop {
            // Sleep at the beginning to allow the server to start up
            sleep(interval).await;

            let instances = self.gateway_service.registry().instances();
            tracing::debug!("Running health probes on {} instance(s)", instances.len());

            for instance in instances {
                let probe_path = self
                    .gateway_service
                    .service_health_path(instance.service());
                let probe_url = instance.endpoint().join(&probe_path);

                match self.http_client.health_check(&probe_url, timeout_secs).await {
                    Ok(true) => {
                        self.handle_probe_success(&instance, health_config);
                    }
                    Ok(false) => {
                        self.handle_probe_failure(
                            &instance,
                            health_config,
                            "backend reported unhealthy",
                        );
                    }
                    Err(err) => {
                        self.handle_probe_failure(
                            &instance,
                            health_config,
                            &format!("probe error: {err}"),
                        );
                    }
                }
            }

            tracing::debug!("Health probe cycle completed");
        }
    }

    /// Handle successful health probe
    fn handle_probe_success(&self, instance: &ServiceInstance, health_config: &HealthCheckConfig) {
        let successes = instance.health().record_success();

        tracing::debug!(
            "Health probe for {} ({}) succeeded ({} consecutive successes)",
            instance.service(),
            instance.id(),
            successes
        );

        if successes >= health_config.healthy_threshold
            && instance.health().status() == HealthStatus::Unhealthy
        {
            tracing::info!(
                "Instance {} of {} is now HEALTHY (after {} consecutive successes)",
                instance.id(),
                instance.service(),
                successes
            );
            instance.health().mark_healthy();
        }
    }

    /// Handle failed health probe
    fn handle_probe_failure(
        &self,
        instance: &ServiceInstance,
        health_config: &HealthCheckConfig,
        reason: &str,
    ) {
        let failures = instance.health().record_failure();

        tracing::info!(
            "Health probe failed for {} ({}): {} (failures: {}/{})",
            instance.service(),
            instance.id(),
            reason,
            failures,
            health_config.unhealthy_threshold
        );

        if failures >= health_config.unhealthy_threshold
            && instance.health().status() == HealthStatus::Healthy
        {
            tracing::warn!(
                "Instance {} of {} is now UNHEALTHY (after {} consecutive failures): {}",
                instance.id(),
                instance.service(),
                failures,
                reason
            );
            instance.health().mark_unhealthy();
        }
    }
}
