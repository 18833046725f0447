//! Fan-out to the flow and incidents providers and merge into one dashboard.
//!
//! Both calls run concurrently with independent timeouts and are joined
//! before merging. Provider failures never escape: they turn into missing
//! data plus a `data_sources` marker.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{
    DashboardSummary, DataSources, Error, Incident, OverallStatus, SourceState, TrafficDashboard,
    TrafficFlowSample, TrafficLevel,
};
use tomtom_client::SharedProvider;
use tracing::{debug, instrument, warn};

/// Run one provider call under `limit`, mapping expiry to `UpstreamTimeout`.
pub(crate) async fn with_timeout<T, F>(provider: &str, limit: Duration, call: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::UpstreamTimeout {
            provider: provider.to_string(),
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Status rules, checked in order: congested, moderate, good, else unknown.
pub fn overall_status(level: TrafficLevel, incident_count: usize) -> OverallStatus {
    if level == TrafficLevel::Heavy || incident_count >= 3 {
        OverallStatus::Congested
    } else if level == TrafficLevel::Moderate || (1..=2).contains(&incident_count) {
        OverallStatus::Moderate
    } else if level == TrafficLevel::Light && incident_count == 0 {
        OverallStatus::Good
    } else {
        OverallStatus::Unknown
    }
}

fn source_state<T>(result: &Result<T, Error>) -> SourceState {
    match result {
        Ok(_) => SourceState::Ok,
        Err(Error::UpstreamTimeout { .. }) => SourceState::TimedOut,
        Err(_) => SourceState::Failed,
    }
}

/// Merge two settled provider results. Never fails.
pub fn merge(
    city: &str,
    flow: Result<TrafficFlowSample, Error>,
    incidents: Result<Vec<Incident>, Error>,
    now: DateTime<Utc>,
) -> TrafficDashboard {
    let data_sources = DataSources {
        flow: source_state(&flow),
        incidents: source_state(&incidents),
    };

    let flow = match flow {
        Ok(sample) => Some(sample),
        Err(e) => {
            warn!("Flow unavailable for {}: {}", city, e);
            None
        }
    };
    let incidents = match incidents {
        Ok(list) => list,
        Err(e) => {
            warn!("Incidents unavailable for {}: {}", city, e);
            Vec::new()
        }
    };

    TrafficDashboard {
        city: city.to_string(),
        timestamp: now,
        summary: summarize(flow.as_ref(), &incidents),
        flow,
        incidents,
        data_sources,
    }
}

fn summarize(flow: Option<&TrafficFlowSample>, incidents: &[Incident]) -> DashboardSummary {
    let traffic_level = flow.map(|f| f.traffic_level).unwrap_or(TrafficLevel::Unknown);
    DashboardSummary {
        overall_status: overall_status(traffic_level, incidents.len()),
        total_incidents: incidents.len(),
        avg_speed: flow.map(|f| f.current_speed).unwrap_or(0.0),
        traffic_level,
    }
}

/// Fill the failed halves of `fresh` from `previous` and recompute the summary.
///
/// Carried halves are marked [`SourceState::Cached`]. A half is only carried
/// when `previous` actually holds data for it.
pub fn carry_over(mut fresh: TrafficDashboard, previous: &TrafficDashboard) -> TrafficDashboard {
    let mut carried = false;

    if fresh.data_sources.flow != SourceState::Ok && previous.flow.is_some() {
        fresh.flow = previous.flow.clone();
        fresh.data_sources.flow = SourceState::Cached;
        carried = true;
    }
    if fresh.data_sources.incidents != SourceState::Ok
        && previous.data_sources.incidents.has_data()
    {
        fresh.incidents = previous.incidents.clone();
        fresh.data_sources.incidents = SourceState::Cached;
        carried = true;
    }

    if carried {
        debug!("Kept previous data for {}: sources={:?}", fresh.city, fresh.data_sources);
        fresh.summary = summarize(fresh.flow.as_ref(), &fresh.incidents);
    }
    fresh
}

/// Dashboard with no upstream data at all.
pub fn degraded(city: &str, now: DateTime<Utc>) -> TrafficDashboard {
    TrafficDashboard {
        city: city.to_string(),
        timestamp: now,
        flow: None,
        incidents: Vec::new(),
        summary: DashboardSummary {
            overall_status: OverallStatus::Unknown,
            total_incidents: 0,
            avg_speed: 0.0,
            traffic_level: TrafficLevel::Unknown,
        },
        data_sources: DataSources {
            flow: SourceState::Failed,
            incidents: SourceState::Failed,
        },
    }
}

/// Concurrent flow + incidents fetch for one city.
#[derive(Clone)]
pub struct Aggregator {
    provider: SharedProvider,
    call_timeout: Duration,
}

impl Aggregator {
    pub fn new(provider: SharedProvider, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    /// Build a dashboard for `city` (a canonical registry name).
    #[instrument(skip(self), fields(provider = %self.provider.name()))]
    pub async fn aggregate(&self, city: &str) -> TrafficDashboard {
        let name = self.provider.name();
        let (flow, incidents) = tokio::join!(
            with_timeout(name, self.call_timeout, self.provider.fetch_flow(city)),
            with_timeout(name, self.call_timeout, self.provider.fetch_incidents(city)),
        );

        let dashboard = merge(city, flow, incidents, Utc::now());
        debug!(
            "Aggregated {}: status={:?} level={:?} incidents={} sources={:?}",
            city,
            dashboard.summary.overall_status,
            dashboard.summary.traffic_level,
            dashboard.summary.total_incidents,
            dashboard.data_sources,
        );
        dashboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Outcome, ScriptedProvider};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[test]
    fn test_overall_status_rules() {
        assert_eq!(overall_status(TrafficLevel::Heavy, 0), OverallStatus::Congested);
        assert_eq!(overall_status(TrafficLevel::Light, 3), OverallStatus::Congested);
        assert_eq!(overall_status(TrafficLevel::Moderate, 0), OverallStatus::Moderate);
        assert_eq!(overall_status(TrafficLevel::Light, 2), OverallStatus::Moderate);
        assert_eq!(overall_status(TrafficLevel::Light, 0), OverallStatus::Good);
        assert_eq!(overall_status(TrafficLevel::Unknown, 0), OverallStatus::Unknown);
        assert_eq!(overall_status(TrafficLevel::Unknown, 1), OverallStatus::Moderate);
    }

    #[tokio::test]
    async fn test_carry_over_keeps_previous_halves() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_current_speed(30.0);
        provider.set_incident_count(1);
        let agg = Aggregator::new(provider.clone(), Duration::from_secs(5));
        let previous = agg.aggregate("Lahore").await;

        provider.set_flow(Outcome::Unavailable);
        provider.set_incidents(Outcome::Unavailable);
        let kept = carry_over(agg.aggregate("Lahore").await, &previous);

        assert_eq!(kept.flow, previous.flow);
        assert_eq!(kept.incidents, previous.incidents);
        assert_eq!(kept.summary, previous.summary);
        assert_eq!(kept.data_sources.flow, SourceState::Cached);
        assert_eq!(kept.data_sources.incidents, SourceState::Cached);
        assert!(kept.data_sources.is_partial());
    }

    #[tokio::test]
    async fn test_carry_over_leaves_live_halves_alone() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_incidents(Outcome::Unavailable);
        let agg = Aggregator::new(provider.clone(), Duration::from_secs(5));
        let previous = agg.aggregate("Multan").await;

        // Previous incidents never loaded, so there is nothing to keep.
        provider.set_current_speed(30.0);
        let next = carry_over(agg.aggregate("Multan").await, &previous);

        assert_eq!(next.data_sources.flow, SourceState::Ok);
        assert_eq!(next.summary.traffic_level, TrafficLevel::Heavy);
        assert_eq!(next.data_sources.incidents, SourceState::Failed);
        assert!(next.incidents.is_empty());
    }

    #[tokio::test]
    async fn test_heavy_flow_without_incidents_is_congested() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_current_speed(30.0);
        let agg = Aggregator::new(provider.clone(), Duration::from_secs(5));

        let dashboard = agg.aggregate("Karachi").await;
        assert_eq!(dashboard.summary.traffic_level, TrafficLevel::Heavy);
        assert_eq!(dashboard.summary.overall_status, OverallStatus::Congested);
        assert_eq!(dashboard.summary.avg_speed, 30.0);
        assert!(!dashboard.data_sources.is_partial());
    }

    #[tokio::test]
    async fn test_light_flow_without_incidents_is_good() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_current_speed(90.0);
        let agg = Aggregator::new(provider, Duration::from_secs(5));

        let dashboard = agg.aggregate("Lahore").await;
        assert_eq!(dashboard.summary.overall_status, OverallStatus::Good);
    }

    #[tokio::test]
    async fn test_both_failures_yield_unknown_dashboard() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_flow(Outcome::Unavailable);
        provider.set_incidents(Outcome::RateLimited);
        let agg = Aggregator::new(provider.clone(), Duration::from_secs(5));

        let dashboard = agg.aggregate("Lahore").await;
        assert!(dashboard.flow.is_none());
        assert!(dashboard.incidents.is_empty());
        assert_eq!(dashboard.summary.overall_status, OverallStatus::Unknown);
        assert_eq!(dashboard.summary.avg_speed, 0.0);
        assert_eq!(dashboard.summary.traffic_level, TrafficLevel::Unknown);
        assert_eq!(dashboard.data_sources.flow, SourceState::Failed);
        assert_eq!(dashboard.data_sources.incidents, SourceState::Failed);
    }

    #[tokio::test]
    async fn test_failed_incidents_keep_flow() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_current_speed(60.0);
        provider.set_incidents(Outcome::Unavailable);
        let agg = Aggregator::new(provider, Duration::from_secs(5));

        let dashboard = agg.aggregate("Multan").await;
        assert!(dashboard.flow.is_some());
        assert_eq!(dashboard.summary.total_incidents, 0);
        assert_eq!(dashboard.summary.overall_status, OverallStatus::Moderate);
        assert_eq!(dashboard.data_sources.incidents, SourceState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_flow_times_out_independently() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_flow(Outcome::Delay(Duration::from_secs(30)));
        provider.set_incident_count(1);
        let agg = Aggregator::new(provider.clone(), Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let dashboard = agg.aggregate("Quetta").await;

        assert!(started.elapsed() < Duration::from_secs(6));
        assert!(dashboard.flow.is_none());
        assert_eq!(dashboard.data_sources.flow, SourceState::TimedOut);
        assert_eq!(dashboard.data_sources.incidents, SourceState::Ok);
        assert_eq!(dashboard.summary.total_incidents, 1);
        assert_eq!(provider.flow_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_run_concurrently() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_flow(Outcome::Delay(Duration::from_secs(2)));
        provider.set_incidents(Outcome::Delay(Duration::from_secs(2)));
        let agg = Aggregator::new(provider, Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let dashboard = agg.aggregate("Sukkur").await;

        // Sequential calls would take 4s.
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!dashboard.data_sources.is_partial());
    }
}
