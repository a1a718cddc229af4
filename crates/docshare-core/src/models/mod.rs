//! Data models shared across the application

mod principal;

pub use principal::*;
