//! Docshare API library
//!
//! Exposes the HTTP surface (routes, handlers, auth) so integration tests can build
//! the same router the binary serves.

pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod storage;
