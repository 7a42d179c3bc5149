//! Gateway error taxonomy and the failure → HTTP status mapping.
//!
//! Every failure a request can hit on its way through the gateway is one of
//! these variants. All of them are recoverable at the request boundary; none
//! is fatal to the process. The externally visible status code is fixed per
//! variant so behavior stays testable.
use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced while routing, resolving, or forwarding a request
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// The inbound path does not match the `/<prefix>/<service>/<rest>` convention
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// The service name was never registered (statically or dynamically)
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// The service is registered but has no healthy instance right now
    #[error("No healthy instance for service: {0}")]
    ServiceUnavailable(String),

    /// The selected backend could not be reached (connection failure or timeout)
    #[error("Upstream unreachable for service {service}: {reason}")]
    UpstreamUnreachable { service: String, reason: String },

    /// The backend answered with a 5xx; reported, never retried
    #[error("Upstream error from service {service}: status {status}")]
    UpstreamError { service: String, status: u16 },
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Stable machine-readable failure kind, used in error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MalformedPath(_) => "malformed_path",
            GatewayError::UnknownService(_) => "unknown_service",
            GatewayError::ServiceUnavailable(_) => "service_unavailable",
            GatewayError::UpstreamUnreachable { .. } => "upstream_unreachable",
            GatewayError::UpstreamError { .. } => "upstream_error",
        }
    }

    /// The service name the request was aimed at, if parsing got that far.
    pub fn service(&self) -> Option<&str> {
        match self {
            GatewayError::MalformedPath(_) => None,
            GatewayError::UnknownService(service)
            | GatewayError::ServiceUnavailable(service)
            | GatewayError::UpstreamUnreachable { service, .. }
            | GatewayError::UpstreamError { service, .. } => Some(service),
        }
    }

    /// The externally visible HTTP status for this failure.
    ///
    /// Unknown and unavailable services are deliberately indistinguishable
    /// to callers (both 503); the taxonomy keeps them apart for diagnostics.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MalformedPath(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnknownService(_)
            | GatewayError::ServiceUnavailable(_)
            | GatewayError::UpstreamUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    /// JSON failure body. Names the service attempted, never internal addresses.
    pub fn to_json_body(&self) -> String {
        let body = serde_json::json!({
            "error": self.kind(),
            "service": self.service(),
            "message": self.to_string(),
        });
        body.to_string()
    }
}
