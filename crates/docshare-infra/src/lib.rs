//! Docshare Infrastructure Library
//!
//! Shared HTTP plumbing used by the Docshare services:
//! - Middleware (request ID, request security filter)
//! - Telemetry initialization

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{
    request_id_middleware, security_filter_middleware, RequestId, RequestSecurityFilter,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;
