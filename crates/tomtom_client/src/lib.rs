//! TomTom traffic API adapters.
//!
//! Each upstream (flow, incidents, routing, search) is normalised into the
//! shared `common` types behind the [`TrafficProvider`] trait. A synthetic
//! [`MockTrafficProvider`] stands in when no API key is configured.

pub mod client;
pub mod flow;
pub mod incidents;
pub mod mock;
pub mod provider;
pub mod rate_limit;
pub mod routing;
pub mod search;

pub use client::TomTomClient;
pub use mock::MockTrafficProvider;
pub use provider::{SharedProvider, TrafficProvider};
pub use rate_limit::RateLimiter;
