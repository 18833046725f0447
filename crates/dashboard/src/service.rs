//! Request-facing operations over the registry, cache and provider.
//!
//! Every operation validates its input before any provider call.

use std::sync::Arc;
use std::time::Duration;

use common::{
    CityRegistry, Coordinates, Error, IncidentReport, PlaceSearchData, RouteData, ServiceConfig,
    TrafficFlowSample,
};
use tomtom_client::SharedProvider;
use tracing::{info, instrument, warn};

use crate::aggregator::{with_timeout, Aggregator};
use crate::cache::{CacheEntry, CacheStats, DashboardCache};

#[derive(Clone)]
pub struct DashboardService {
    registry: Arc<CityRegistry>,
    provider: SharedProvider,
    cache: DashboardCache,
    call_timeout: Duration,
}

impl DashboardService {
    pub fn new(
        registry: Arc<CityRegistry>,
        provider: SharedProvider,
        ttl: Duration,
        call_timeout: Duration,
        lock_timeout: Duration,
    ) -> Result<Self, Error> {
        if call_timeout.is_zero() {
            return Err(Error::Config("provider call timeout must be greater than zero".into()));
        }
        let aggregator = Aggregator::new(provider.clone(), call_timeout);
        let cache = DashboardCache::new(aggregator, ttl, lock_timeout)?;
        info!(
            "Dashboard service ready: provider={} cities={} ttl={:?}",
            provider.name(),
            registry.len(),
            ttl
        );
        Ok(Self {
            registry,
            provider,
            cache,
            call_timeout,
        })
    }

    pub fn from_config(
        config: &ServiceConfig,
        registry: Arc<CityRegistry>,
        provider: SharedProvider,
    ) -> Result<Self, Error> {
        Self::new(
            registry,
            provider,
            Duration::from_secs(config.cache.ttl_secs),
            Duration::from_millis(config.timing.call_timeout_ms),
            Duration::from_millis(config.cache.lock_timeout_ms),
        )
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Supported city names in configuration order.
    pub fn cities(&self) -> Vec<String> {
        self.registry.names()
    }

    #[instrument(skip(self))]
    pub async fn get_dashboard(&self, city: &str) -> Result<CacheEntry, Error> {
        let city = self.registry.resolve(city)?;
        Ok(self.cache.get(&city.name).await)
    }

    /// Live flow, falling back to the cached dashboard's flow on upstream failure.
    #[instrument(skip(self))]
    pub async fn get_flow(&self, city: &str) -> Result<TrafficFlowSample, Error> {
        let city = self.registry.resolve(city)?;
        let live = with_timeout(
            self.provider.name(),
            self.call_timeout,
            self.provider.fetch_flow(&city.name),
        )
        .await;

        match live {
            Ok(sample) => Ok(sample),
            Err(e) if e.is_upstream() => {
                match self.cache.peek(&city.name).and_then(|entry| entry.dashboard.flow) {
                    Some(cached) => {
                        warn!("Flow for {} failed ({}), serving cached sample", city.name, e);
                        Ok(cached)
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Live incidents, falling back to the cached list when that list holds
    /// upstream data.
    #[instrument(skip(self))]
    pub async fn get_incidents(&self, city: &str) -> Result<IncidentReport, Error> {
        let city = self.registry.resolve(city)?;
        let live = with_timeout(
            self.provider.name(),
            self.call_timeout,
            self.provider.fetch_incidents(&city.name),
        )
        .await;

        match live {
            Ok(incidents) => Ok(IncidentReport::new(city.name.clone(), incidents)),
            Err(e) if e.is_upstream() => {
                let cached = self
                    .cache
                    .peek(&city.name)
                    .filter(|entry| entry.dashboard.data_sources.incidents.has_data());
                match cached {
                    Some(entry) => {
                        warn!("Incidents for {} failed ({}), serving cached list", city.name, e);
                        Ok(IncidentReport::new(city.name.clone(), entry.dashboard.incidents))
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// `origin` and `destination` are `"lat,lon"` strings.
    #[instrument(skip(self))]
    pub async fn get_route(&self, origin: &str, destination: &str) -> Result<RouteData, Error> {
        let origin = Coordinates::parse(origin)?;
        let destination = Coordinates::parse(destination)?;
        with_timeout(
            self.provider.name(),
            self.call_timeout,
            self.provider.fetch_route(origin, destination),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search_places(&self, query: &str, city: &str) -> Result<PlaceSearchData, Error> {
        let city = self.registry.resolve(city)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("search query must not be empty".into()));
        }
        with_timeout(
            self.provider.name(),
            self.call_timeout,
            self.provider.fetch_places(query, &city.name),
        )
        .await
    }
}
