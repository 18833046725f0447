//! Dashboard crate.
//!
//! Fans out to the traffic providers, merges the results into per-city
//! dashboards and serves them through a stale-while-revalidate cache.

pub mod aggregator;
pub mod cache;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::{overall_status, Aggregator};
pub use cache::{CacheEntry, CacheStats, DashboardCache};
pub use service::DashboardService;
