//! Per-city dashboard cache with stale-while-revalidate and single-flight refresh.
//!
//! - Fresh entries (age <= TTL) are served without touching providers.
//! - Stale entries are served immediately, flagged `stale`, and trigger one
//!   background refresh.
//! - A miss blocks on the refresh, bounded by the lock timeout.
//!
//! At most one refresh per city is in flight. Waiters share its result, and
//! the refresh runs to completion on its own task even if every waiter
//! gives up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{Error, TrafficDashboard};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregator::{self, Aggregator};

type Refresh = Shared<BoxFuture<'static, TrafficDashboard>>;

/// A cached dashboard and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub city: String,
    pub dashboard: TrafficDashboard,
    pub fetched_at: Instant,
    /// Older than the TTL at the time it was read.
    pub stale: bool,
}

impl CacheEntry {
    fn new(city: &str, dashboard: TrafficDashboard) -> Self {
        Self {
            city: city.to_string(),
            dashboard,
            fetched_at: Instant::now(),
            stale: false,
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Counts reported by the heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: usize,
    pub in_flight: usize,
    pub stale: usize,
}

struct Inner {
    entries: DashMap<String, CacheEntry>,
    in_flight: DashMap<String, Refresh>,
    aggregator: Aggregator,
    ttl: Duration,
    lock_timeout: Duration,
}

#[derive(Clone)]
pub struct DashboardCache {
    inner: Arc<Inner>,
}

impl DashboardCache {
    pub fn new(
        aggregator: Aggregator,
        ttl: Duration,
        lock_timeout: Duration,
    ) -> Result<Self, Error> {
        if ttl.is_zero() {
            return Err(Error::Config("cache TTL must be greater than zero".into()));
        }
        if lock_timeout.is_zero() {
            return Err(Error::Config("cache lock timeout must be greater than zero".into()));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                aggregator,
                ttl,
                lock_timeout,
            }),
        })
    }

    /// Current entry for `city` without triggering any fetch.
    pub fn peek(&self, city: &str) -> Option<CacheEntry> {
        let mut entry = self.inner.entries.get(city)?.clone();
        entry.stale = entry.age() > self.inner.ttl;
        Some(entry)
    }

    /// Dashboard for a canonical city name. Never fails: provider trouble
    /// shows up inside the dashboard, lock trouble as a stale or degraded entry.
    pub async fn get(&self, city: &str) -> CacheEntry {
        if let Some(entry) = self.peek(city) {
            if entry.stale {
                debug!("Serving stale {} (age {:?}), refreshing", city, entry.age());
                let _ = self.join_refresh(city);
            }
            return entry;
        }

        let refresh = self.join_refresh(city);
        match tokio::time::timeout(self.inner.lock_timeout, refresh).await {
            Ok(dashboard) => self
                .peek(city)
                .unwrap_or_else(|| CacheEntry::new(city, dashboard)),
            Err(_) => {
                let err = Error::CacheLockTimeout {
                    city: city.to_string(),
                    waited_ms: self.inner.lock_timeout.as_millis() as u64,
                };
                warn!("{}", err);
                self.peek(city).unwrap_or_else(|| {
                    let mut entry = CacheEntry::new(city, aggregator::degraded(city, Utc::now()));
                    entry.stale = true;
                    entry
                })
            }
        }
    }

    /// Join the in-flight refresh for `city`, starting one if there is none.
    fn join_refresh(&self, city: &str) -> Refresh {
        let started = match self.inner.in_flight.entry(city.to_string()) {
            Entry::Occupied(e) => return e.get().clone(),
            Entry::Vacant(v) => {
                // A refresh inserts its entry before leaving `in_flight`, so one
                // that finished since the caller's peek is visible here.
                if let Some(dashboard) = self.fresh(city) {
                    return future::ready(dashboard).boxed().shared();
                }

                let inner = Arc::clone(&self.inner);
                let key = city.to_string();
                let refresh = async move {
                    let fetched = inner.aggregator.aggregate(&key).await;
                    let previous = inner.entries.get(&key).map(|e| e.dashboard.clone());
                    let dashboard = match previous {
                        Some(previous) => aggregator::carry_over(fetched, &previous),
                        None => fetched,
                    };
                    inner
                        .entries
                        .insert(key.clone(), CacheEntry::new(&key, dashboard.clone()));
                    inner.in_flight.remove(&key);
                    dashboard
                }
                .boxed()
                .shared();
                v.insert(refresh.clone());
                refresh
            }
        };

        info!("Refreshing dashboard for {}", city);
        tokio::spawn(started.clone());
        started
    }

    fn fresh(&self, city: &str) -> Option<TrafficDashboard> {
        self.inner
            .entries
            .get(city)
            .filter(|e| e.age() <= self.inner.ttl)
            .map(|e| e.dashboard.clone())
    }

    pub fn stats(&self) -> CacheStats {
        let ttl = self.inner.ttl;
        CacheStats {
            cached: self.inner.entries.len(),
            in_flight: self.inner.in_flight.len(),
            stale: self
                .inner
                .entries
                .iter()
                .filter(|e| e.value().age() > ttl)
                .count(),
        }
    }
}
