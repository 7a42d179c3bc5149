//! Portico - an API gateway with path-based service routing.
//!
//! Portico forwards requests of the form `/api/<service>/<rest...>` to
//! backend service instances. Backends are located through a service
//! registry that is seeded from static configuration and kept fresh by a
//! background health-probe loop; backends may also join and leave at
//! runtime through a small registration surface.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use portico::{GatewayService, config::ServerConfig};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = ServerConfig::builder()
//!     .listen_addr("127.0.0.1:8080")
//!     .service("users-service", ["http://localhost:8081"])
//!     .build()
//!     .map_err(|e| eyre::eyre!(e))?;
//! let gateway = Arc::new(GatewayService::new(Arc::new(config)));
//! // Wire this into the HttpHandler adapter (see the binary crate)
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping business logic inside `core`:
//! * `core::router`: pure parse of inbound paths into service names
//! * `core::registry`: concurrent instance table with first-match resolution
//! * `core::gateway`: composition and the failure taxonomy
//! * `adapters::http_client`: hyper/rustls forwarder and health prober
//! * `adapters::http_handler`: inbound surface and access logging
//! * `adapters::health_checker`: the background probe loop
//!
//! # Error Handling
//! Request-path failures are the closed [`core::GatewayError`] taxonomy with
//! a fixed HTTP status per variant; application paths return
//! `eyre::Result<T>` with context attached via `WrapErr`.
//!
//! # Concurrency & Data Structures
//! The registry uses `scc::HashMap` for the shared service table and
//! per-instance atomics for health, so request handling and the probe loop
//! never block each other.
pub mod config;
pub mod ports;
pub mod tracing_setup;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HealthChecker, HttpClientAdapter, HttpHandler},
    core::{GatewayService, ServiceRegistry},
    ports::http_client::HttpClient,
};
