//! Shared types, config, city registry and error definitions for trafficwise.

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::ServiceConfig;
pub use error::Error;
pub use registry::{City, CityRegistry};
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
