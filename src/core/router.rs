//! Path router: maps inbound request paths onto logical service names.
//!
//! A proxied path must match `/<prefix>/<service-token>/<rest...>`. The
//! service token becomes the registry name by appending the configured
//! suffix, and everything after it is the path forwarded to the backend.
//! Pure string work, no side effects.
use crate::{
    config::RoutingConfig,
    core::error::{GatewayError, GatewayResult},
};

/// Outcome of parsing an inbound path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Logical service name (token + suffix), e.g. `users-service`
    pub service: String,
    /// Path forwarded to the backend, always starting with `/`
    pub forward_path: String,
}

/// Parses inbound paths according to the configured routing convention.
pub struct PathRouter {
    prefix: String,
    service_suffix: String,
}

impl PathRouter {
    pub fn new(routing: &RoutingConfig) -> Self {
        Self {
            prefix: routing.prefix.clone(),
            service_suffix: routing.service_suffix.clone(),
        }
    }

    /// Parse `path` into a service name and forward path.
    ///
    /// Fails with [`GatewayError::MalformedPath`] when the prefix literal
    /// does not match or fewer than two segments follow it.
    pub fn parse(&self, path: &str) -> GatewayResult<ParsedPath> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let mut segments = trimmed.splitn(3, '/');

        let prefix = segments.next().unwrap_or_default();
        if prefix != self.prefix {
            return Err(GatewayError::MalformedPath(path.to_string()));
        }

        let token = match segments.next() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(GatewayError::MalformedPath(path.to_string())),
        };

        // The rest may be an empty segment (trailing slash) but must be present:
        // "/api/users" alone is malformed, "/api/users/" forwards to "/".
        let rest = match segments.next() {
            Some(rest) => rest,
            None => return Err(GatewayError::MalformedPath(path.to_string())),
        };

        Ok(ParsedPath {
            service: format!("{token}{}", self.service_suffix),
            forward_path: format!("/{rest}"),
        })
    }
}
