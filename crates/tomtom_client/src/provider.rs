//! The adapter seam between upstream providers and the aggregator.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Coordinates, Error, Incident, PlaceSearchData, RouteData, TrafficFlowSample};

/// One upstream traffic data provider.
///
/// Implementations are stateless from the caller's point of view and safe
/// to call concurrently. City arguments must name a registry city; anything
/// else fails with `Error::InvalidCity` before any network traffic.
#[async_trait]
pub trait TrafficProvider: Send + Sync {
    /// Short label used in logs and upstream errors.
    fn name(&self) -> &str;

    async fn fetch_flow(&self, city: &str) -> Result<TrafficFlowSample, Error>;

    async fn fetch_incidents(&self, city: &str) -> Result<Vec<Incident>, Error>;

    async fn fetch_route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<RouteData, Error>;

    async fn fetch_places(&self, query: &str, city: &str) -> Result<PlaceSearchData, Error>;
}

pub type SharedProvider = Arc<dyn TrafficProvider>;
