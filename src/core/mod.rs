pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod router;

pub use error::GatewayError;
pub use gateway::{GatewayService, ResolvedTarget};
pub use registry::{ServiceRecord, ServiceRegistry};
pub use router::PathRouter;
