//! Scripted provider double with call counters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    CityRegistry, Coordinates, Error, FlowReading, Incident, PlaceSearchData, RouteData,
    ServiceConfig, Severity, TrafficFlowSample,
};
use tomtom_client::TrafficProvider;

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Ok,
    Unavailable,
    RateLimited,
    /// Succeed after sleeping.
    Delay(Duration),
}

pub struct ScriptedProvider {
    registry: Arc<CityRegistry>,
    flow: Mutex<Outcome>,
    incidents: Mutex<Outcome>,
    current_speed: Mutex<f64>,
    incident_count: AtomicUsize,
    pub flow_calls: AtomicUsize,
    pub incident_calls: AtomicUsize,
    pub route_calls: AtomicUsize,
    pub place_calls: AtomicUsize,
}

pub fn registry() -> Arc<CityRegistry> {
    Arc::new(CityRegistry::from_config(&ServiceConfig::default().cities).unwrap())
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            registry: registry(),
            flow: Mutex::new(Outcome::Ok),
            incidents: Mutex::new(Outcome::Ok),
            current_speed: Mutex::new(80.0),
            incident_count: AtomicUsize::new(0),
            flow_calls: AtomicUsize::new(0),
            incident_calls: AtomicUsize::new(0),
            route_calls: AtomicUsize::new(0),
            place_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_flow(&self, outcome: Outcome) {
        *self.flow.lock().unwrap() = outcome;
    }

    pub fn set_incidents(&self, outcome: Outcome) {
        *self.incidents.lock().unwrap() = outcome;
    }

    /// Free-flow speed is fixed at 100 km/h.
    pub fn set_current_speed(&self, kmph: f64) {
        *self.current_speed.lock().unwrap() = kmph;
    }

    pub fn set_incident_count(&self, n: usize) {
        self.incident_count.store(n, Ordering::SeqCst);
    }

    pub fn provider_calls(&self) -> usize {
        self.flow_calls.load(Ordering::SeqCst)
            + self.incident_calls.load(Ordering::SeqCst)
            + self.route_calls.load(Ordering::SeqCst)
            + self.place_calls.load(Ordering::SeqCst)
    }

    async fn play(outcome: Outcome) -> Result<(), Error> {
        match outcome {
            Outcome::Ok => Ok(()),
            Outcome::Unavailable => Err(Error::UpstreamUnavailable {
                provider: "scripted".into(),
                message: "503 Service Unavailable".into(),
            }),
            Outcome::RateLimited => Err(Error::UpstreamRateLimited {
                provider: "scripted".into(),
                retry_after_ms: 1_000,
            }),
            Outcome::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TrafficProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_flow(&self, city: &str) -> Result<TrafficFlowSample, Error> {
        self.flow_calls.fetch_add(1, Ordering::SeqCst);
        let city = self.registry.resolve(city)?.clone();
        let outcome = *self.flow.lock().unwrap();
        Self::play(outcome).await?;
        let current_speed = *self.current_speed.lock().unwrap();
        Ok(TrafficFlowSample::new(
            city.name,
            city.coordinates,
            Utc::now(),
            FlowReading {
                current_speed,
                free_flow_speed: 100.0,
                current_travel_time: 60,
                free_flow_travel_time: 40,
                confidence: 1.0,
                road_closure: false,
            },
        ))
    }

    async fn fetch_incidents(&self, city: &str) -> Result<Vec<Incident>, Error> {
        self.incident_calls.fetch_add(1, Ordering::SeqCst);
        let city = self.registry.resolve(city)?.clone();
        let outcome = *self.incidents.lock().unwrap();
        Self::play(outcome).await?;
        let n = self.incident_count.load(Ordering::SeqCst);
        Ok((0..n)
            .map(|i| Incident {
                id: format!("inc-{i}"),
                incident_type: 6,
                description: "Queuing traffic".into(),
                coordinates: city.coordinates,
                start_time: Utc::now(),
                end_time: None,
                delay: 120,
                length: 500.0,
                severity: Severity::Major,
            })
            .collect())
    }

    async fn fetch_route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<RouteData, Error> {
        self.route_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RouteData {
            origin,
            destination,
            routes: Vec::new(),
        })
    }

    async fn fetch_places(&self, query: &str, city: &str) -> Result<PlaceSearchData, Error> {
        self.place_calls.fetch_add(1, Ordering::SeqCst);
        let city = self.registry.resolve(city)?.clone();
        Ok(PlaceSearchData::new(query.trim(), city.name, Vec::new()))
    }
}
