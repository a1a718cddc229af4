//! Shared HTTP middleware for Docshare services

pub mod request_id;
pub mod security_filter;

pub use request_id::{request_id_middleware, RequestId};
pub use security_filter::{security_filter_middleware, RequestSecurityFilter};
