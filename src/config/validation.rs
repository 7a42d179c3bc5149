use std::net::SocketAddr;

use url::Url;

use crate::config::models::{HealthCheckConfig, RoutingConfig, ServerConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if let Err(mut routing_errors) = Self::validate_routing(&config.routing) {
            errors.append(&mut routing_errors);
        }

        for (service, addresses) in &config.static_services {
            if addresses.is_empty() {
                errors.push(ValidationError::InvalidField {
                    field: format!("static_services.{service}"),
                    message: "Service must list at least one address".to_string(),
                });
            }
            for address in addresses {
                if let Err(e) =
                    Self::validate_url(address, &format!("static_services.{service}"))
                {
                    errors.push(e);
                }
            }
        }

        if let Err(mut health_check_errors) =
            Self::validate_health_check_config(&config.health_check)
        {
            errors.append(&mut health_check_errors);
        }

        for (service, path) in &config.service_health_paths {
            if !path.starts_with('/') {
                errors.push(ValidationError::InvalidField {
                    field: format!("service_health_paths.{service}"),
                    message: "Health probe paths must start with '/'".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate the path routing convention
    fn validate_routing(routing: &RoutingConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if routing.prefix.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "routing.prefix".to_string(),
            });
        } else if routing.prefix.contains('/') {
            errors.push(ValidationError::InvalidField {
                field: "routing.prefix".to_string(),
                message: "Prefix is a single path segment and must not contain '/'".to_string(),
            });
        }

        if routing.service_suffix.contains('/') {
            errors.push(ValidationError::InvalidField {
                field: "routing.service_suffix".to_string(),
                message: "Service suffix must not contain '/'".to_string(),
            });
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Validate a backend base URL
    fn validate_url(url: &str, field: &str) -> ValidationResult<()> {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                if parsed.host_str().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: field.to_string(),
                        message: format!("URL '{url}' has no host"),
                    });
                }
                Ok(())
            }
            Ok(parsed) => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!(
                    "URL '{url}' uses unsupported scheme '{}'; only http and https are allowed",
                    parsed.scheme()
                ),
            }),
            Err(e) => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("URL '{url}' is not a valid URL: {e}"),
            }),
        }
    }

    /// Validate health check configuration
    fn validate_health_check_config(
        config: &HealthCheckConfig,
    ) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !config.enabled {
            return Ok(());
        }

        if config.interval_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "health_check.interval_secs".to_string(),
                message: "Probe interval must be greater than zero".to_string(),
            });
        }

        if config.timeout_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "health_check.timeout_secs".to_string(),
                message: "Probe timeout must be greater than zero".to_string(),
            });
        }

        if config.timeout_secs >= config.interval_secs && config.interval_secs > 0 {
            errors.push(ValidationError::InvalidField {
                field: "health_check.timeout_secs".to_string(),
                message: "Probe timeout must be shorter than the probe interval".to_string(),
            });
        }

        if !config.path.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: "health_check.path".to_string(),
                message: "Health probe path must start with '/'".to_string(),
            });
        }

        if config.unhealthy_threshold == 0 {
            errors.push(ValidationError::InvalidField {
                field: "health_check.unhealthy_threshold".to_string(),
                message: "Threshold must be at least 1".to_string(),
            });
        }

        if config.healthy_threshold == 0 {
            errors.push(ValidationError::InvalidField {
                field: "health_check.healthy_threshold".to_string(),
                message: "Threshold must be at least 1".to_string(),
            });
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("  {}. {e}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
