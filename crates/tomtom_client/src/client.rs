//! TomTom HTTP client shared by the flow, incidents, routing and search adapters.
//!
//! Owns the connection pool, API key and rate limiter, and maps HTTP
//! outcomes onto the upstream error taxonomy.

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::config::ProviderConfig;
use common::{
    City, CityRegistry, Coordinates, Error, Incident, PlaceSearchData, RouteData,
    TrafficFlowSample,
};
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::provider::TrafficProvider;
use crate::rate_limit::RateLimiter;
use crate::{flow, incidents, routing, search};

pub(crate) const PROVIDER: &str = "tomtom";
const DEFAULT_RETRY_AFTER_MS: u64 = 1_000;

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so DNS/TLS/socket failures are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace(['\n', '\r'], " ");
    match compact.char_indices().nth(MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &compact[..idx]),
        None => compact,
    }
}

/// Map a non-200 status onto the upstream error taxonomy.
pub(crate) fn status_error(status: StatusCode, retry_after: Option<&str>, body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::UpstreamAuth {
            provider: PROVIDER.into(),
            message: format!("{}: {}", status, summarize_response_body(body)),
        },
        StatusCode::TOO_MANY_REQUESTS => Error::UpstreamRateLimited {
            provider: PROVIDER.into(),
            retry_after_ms: retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1_000))
                .unwrap_or(DEFAULT_RETRY_AFTER_MS),
        },
        _ => Error::UpstreamUnavailable {
            provider: PROVIDER.into(),
            message: format!("{}: {}", status, summarize_response_body(body)),
        },
    }
}

/// Async client for the TomTom traffic, routing and search APIs.
#[derive(Debug, Clone)]
pub struct TomTomClient {
    client: reqwest::Client,
    api_key: String,
    providers: ProviderConfig,
    registry: Arc<CityRegistry>,
    limiter: RateLimiter,
}

impl TomTomClient {
    pub fn new(api_key: String, providers: ProviderConfig, registry: Arc<CityRegistry>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("trafficwise/0.1")
            .pool_max_idle_per_host(4)
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build TomTom HTTP client");

        let limiter = RateLimiter::per_second(providers.requests_per_second);

        Self {
            client,
            api_key,
            providers,
            registry,
            limiter,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn resolve(&self, city: &str) -> Result<&City, Error> {
        self.registry.resolve(city)
    }

    fn require_key(&self) -> Result<&str, Error> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(Error::UpstreamAuth {
                provider: PROVIDER.into(),
                message: "TOMTOM_API_KEY is not configured".into(),
            });
        }
        Ok(key)
    }

    /// `base` with `segments` appended, each percent-encoded.
    pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(base)
            .map_err(|e| Error::Config(format!("invalid provider URL {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("provider URL cannot be a base: {base}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Rate-limited GET returning parsed JSON.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let key = self.require_key()?;
        if !self.limiter.try_acquire() {
            debug!("TomTom request budget exhausted, waiting for a slot");
            self.limiter.wait().await;
        }

        debug!("TomTom GET {}", url);

        let resp = self
            .client
            .get(url.clone())
            .query(query)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable {
                provider: PROVIDER.into(),
                message: format_reqwest_error(&e),
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = resp.text().await.unwrap_or_default();
            let err = status_error(status, retry_after.as_deref(), &body);
            warn!("TomTom {} returned {}", url.path(), status);
            return Err(err);
        }

        resp.json::<T>().await.map_err(|e| Error::UpstreamUnavailable {
            provider: PROVIDER.into(),
            message: format!("invalid JSON from {}: {}", url.path(), format_reqwest_error(&e)),
        })
    }
}

#[async_trait]
impl TrafficProvider for TomTomClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_flow(&self, city: &str) -> Result<TrafficFlowSample, Error> {
        let city = self.resolve(city)?;
        let url = Self::endpoint(self.providers.flow_url(), flow::PATH)?;
        let query = flow::query(city, self.providers.speed_unit);
        let resp: flow::FlowResponse = self.get_json(url, &query).await?;
        flow::normalize(city, self.providers.speed_unit, resp, Utc::now())
    }

    async fn fetch_incidents(&self, city: &str) -> Result<Vec<Incident>, Error> {
        let city = self.resolve(city)?;
        let url = Self::endpoint(self.providers.incidents_url(), incidents::PATH)?;
        let query = incidents::query(city, self.providers.incident_radius_deg);
        let resp: incidents::IncidentsResponse = self.get_json(url, &query).await?;
        Ok(incidents::normalize(city, resp, Utc::now()))
    }

    async fn fetch_route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<RouteData, Error> {
        let locations = routing::locations(origin, destination);
        let mut segments: Vec<&str> = routing::PATH_PREFIX.to_vec();
        segments.push(&locations);
        segments.push("json");
        let url = Self::endpoint(self.providers.routing_url(), &segments)?;
        let resp: routing::RouteResponse = self.get_json(url, &routing::query()).await?;
        Ok(routing::normalize(origin, destination, resp))
    }

    async fn fetch_places(&self, query: &str, city: &str) -> Result<PlaceSearchData, Error> {
        let city = self.resolve(city)?;
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidQuery("search query must not be empty".into()));
        }
        let file = format!("{trimmed}.json");
        let mut segments: Vec<&str> = search::PATH_PREFIX.to_vec();
        segments.push(&file);
        let url = Self::endpoint(self.providers.search_url(), &segments)?;
        let resp: search::SearchResponse = self.get_json(url, &search::query(city)).await?;
        Ok(search::normalize(trimmed, city, resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ServiceConfig;

    fn client(api_key: &str) -> TomTomClient {
        let cfg = ServiceConfig::default();
        let registry = Arc::new(CityRegistry::from_config(&cfg.cities).unwrap());
        // Port 9 (discard) so any accidental network call fails fast.
        let providers = ProviderConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..cfg.providers
        };
        TomTomClient::new(api_key.into(), providers, registry)
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, None, "Developer Inactive"),
            Error::UpstreamAuth { .. }
        ));
        match status_error(StatusCode::TOO_MANY_REQUESTS, Some("3"), "") {
            Error::UpstreamRateLimited { retry_after_ms, .. } => assert_eq!(retry_after_ms, 3_000),
            other => panic!("expected rate limit, got {:?}", other),
        }
        match status_error(StatusCode::TOO_MANY_REQUESTS, None, "") {
            Error::UpstreamRateLimited { retry_after_ms, .. } => {
                assert_eq!(retry_after_ms, DEFAULT_RETRY_AFTER_MS)
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, None, "<html>"),
            Error::UpstreamUnavailable { .. }
        ));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = TomTomClient::endpoint(
            "https://api.tomtom.com/",
            &["search", "2", "search", "Liberty Market/Gulberg.json"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.tomtom.com/search/2/search/Liberty%20Market%2FGulberg.json"
        );
    }

    #[test]
    fn test_summarize_truncates_on_char_boundary() {
        let long = "ٹریفک".repeat(200);
        let summary = summarize_response_body(&long);
        assert!(summary.ends_with('…'));
    }

    #[tokio::test]
    async fn test_invalid_city_fails_before_network() {
        let c = client("secret");
        assert!(matches!(c.fetch_flow("Atlantis").await, Err(Error::InvalidCity(_))));
        assert!(matches!(c.fetch_incidents("Atlantis").await, Err(Error::InvalidCity(_))));
        assert!(matches!(
            c.fetch_places("cafe", "Atlantis").await,
            Err(Error::InvalidCity(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_error() {
        let c = client("");
        assert!(!c.is_configured());
        assert!(matches!(c.fetch_flow("Lahore").await, Err(Error::UpstreamAuth { .. })));
    }

    #[tokio::test]
    async fn test_empty_search_query_rejected() {
        let c = client("secret");
        assert!(matches!(
            c.fetch_places("   ", "Lahore").await,
            Err(Error::InvalidQuery(_))
        ));
    }
}
