use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU8, AtomicU32, Ordering},
};

use thiserror::Error;
use url::Url;

use crate::config::HealthStatus;

// Constants for health status to replace magic numbers
const HEALTH_STATUS_UNHEALTHY: u8 = 0;
const HEALTH_STATUS_HEALTHY: u8 = 1;

/// Errors related to endpoint addresses
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EndpointError {
    /// Error when the address is not a usable base URL
    #[error("Invalid endpoint address: {0}")]
    InvalidAddress(String),
}

/// Result type for endpoint operations
pub type EndpointResult<T> = Result<T, EndpointError>;

/// A validated backend base URL (scheme + host + optional port, no path)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    base_url: String,
    is_secure: bool,
}

impl Endpoint {
    /// Creates a new Endpoint if the provided string is an absolute http(s) URL.
    ///
    /// Any path, query, or fragment on the address is rejected; an endpoint is
    /// a network location, the forward path is supplied per request.
    pub fn new(address: &str) -> EndpointResult<Self> {
        let parsed = Url::parse(address)
            .map_err(|e| EndpointError::InvalidAddress(format!("{address}: {e}")))?;

        let is_secure = match parsed.scheme() {
            "http" => false,
            "https" => true,
            other => {
                return Err(EndpointError::InvalidAddress(format!(
                    "{address}: unsupported scheme '{other}', expected http or https"
                )));
            }
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| EndpointError::InvalidAddress(format!("{address}: missing host")))?;

        if !matches!(parsed.path(), "" | "/") || parsed.query().is_some() {
            return Err(EndpointError::InvalidAddress(format!(
                "{address}: endpoint addresses must not carry a path or query"
            )));
        }

        let base_url = match parsed.port() {
            Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
            None => format!("{}://{host}", parsed.scheme()),
        };

        Ok(Endpoint {
            base_url,
            is_secure,
        })
    }

    /// Get the base URL as a string reference (no trailing slash)
    pub fn as_str(&self) -> &str {
        &self.base_url
    }

    /// Check if the endpoint is using HTTPS
    pub fn is_secure(&self) -> bool {
        self.is_secure
    }

    /// Join a forward path (and optional query) onto this endpoint
    pub fn join(&self, forward_path: &str) -> String {
        format!("{}{forward_path}", self.base_url)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::new(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

/// Tracks the probed health of a single service instance
#[derive(Debug)]
pub struct InstanceHealth {
    /// Current health status (uses atomic for thread safety)
    status: AtomicU8, // Uses HEALTH_STATUS_* constants
    /// Counter for consecutive successful health probes
    consecutive_successes: AtomicU32,
    /// Counter for consecutive failed health probes
    consecutive_failures: AtomicU32,
}

impl InstanceHealth {
    /// New instances start healthy; the probe loop demotes them after
    /// `unhealthy_threshold` consecutive failures.
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(HEALTH_STATUS_HEALTHY),
            consecutive_successes: AtomicU32::new(0),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Get the current health status
    pub fn status(&self) -> HealthStatus {
        if self.status.load(Ordering::Acquire) == HEALTH_STATUS_HEALTHY {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == HealthStatus::Healthy
    }

    /// Record a successful probe; returns the new consecutive success count.
    pub fn record_success(&self) -> u32 {
        self.consecutive_failures.store(0, Ordering::Release);
        self.consecutive_successes.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Record a failed probe; returns the new consecutive failure count.
    pub fn record_failure(&self) -> u32 {
        self.consecutive_successes.store(0, Ordering::Release);
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark the instance as healthy
    pub fn mark_healthy(&self) {
        self.status.store(HEALTH_STATUS_HEALTHY, Ordering::Release);
    }

    /// Mark the instance as unhealthy
    pub fn mark_unhealthy(&self) {
        self.status
            .store(HEALTH_STATUS_UNHEALTHY, Ordering::Release);
    }

    /// Get the number of consecutive successful probes
    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes.load(Ordering::Relaxed)
    }

    /// Get the number of consecutive failed probes
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

impl Default for InstanceHealth {
    fn default() -> Self {
        Self::new()
    }
}
