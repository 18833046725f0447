//! Domain types shared across the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

// ── Geography ─────────────────────────────────────────────────────────

/// A WGS84 point. Construct through [`Coordinates::new`] to keep it in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, Error> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidQuery(format!("latitude {lat} out of range")));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidQuery(format!("longitude {lon} out of range")));
        }
        Ok(Self { lat, lon })
    }

    /// Parse `"lat,lon"` as used by the route query parameters.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let (lat, lon) = raw
            .split_once(',')
            .ok_or_else(|| Error::InvalidQuery(format!("expected \"lat,lon\", got \"{raw}\"")))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::InvalidQuery(format!("invalid latitude in \"{raw}\"")))?;
        let lon = lon
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::InvalidQuery(format!("invalid longitude in \"{raw}\"")))?;
        Self::new(lat, lon)
    }

    /// `lat,lon` as TomTom expects it in paths and `point=` parameters.
    pub fn to_query(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

// ── Flow ──────────────────────────────────────────────────────────────

/// Congestion bucket derived from `current_speed / free_flow_speed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
    Unknown,
}

impl TrafficLevel {
    /// ratio ≥ 0.75 light, 0.45..0.75 moderate, below 0.45 heavy.
    /// A zero (or non-finite) free-flow speed yields `Unknown`.
    pub fn from_speeds(current_speed: f64, free_flow_speed: f64) -> Self {
        if !free_flow_speed.is_finite() || free_flow_speed <= 0.0 || !current_speed.is_finite() {
            return TrafficLevel::Unknown;
        }
        let ratio = current_speed.max(0.0) / free_flow_speed;
        if ratio >= 0.75 {
            TrafficLevel::Light
        } else if ratio >= 0.45 {
            TrafficLevel::Moderate
        } else {
            TrafficLevel::Heavy
        }
    }

    /// Map widget colour for this level.
    pub fn color(&self) -> &'static str {
        match self {
            TrafficLevel::Light => "#22c55e",
            TrafficLevel::Moderate => "#eab308",
            TrafficLevel::Heavy => "#ef4444",
            TrafficLevel::Unknown => "#6b7280",
        }
    }
}

/// Raw measurement handed over by an adapter, already in km/h and seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowReading {
    pub current_speed: f64,
    pub free_flow_speed: f64,
    pub current_travel_time: u32,
    pub free_flow_travel_time: u32,
    pub confidence: f64,
    pub road_closure: bool,
}

/// A point-in-time flow measurement for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficFlowSample {
    pub city: String,
    pub coordinates: Coordinates,
    pub timestamp: DateTime<Utc>,
    /// km/h
    pub current_speed: f64,
    /// km/h
    pub free_flow_speed: f64,
    /// seconds
    pub current_travel_time: u32,
    /// seconds
    pub free_flow_travel_time: u32,
    pub confidence: f64,
    pub road_closure: bool,
    pub traffic_level: TrafficLevel,
    pub traffic_color: String,
}

impl TrafficFlowSample {
    /// Build a sample, clamping out-of-range readings and deriving the level.
    pub fn new(
        city: impl Into<String>,
        coordinates: Coordinates,
        timestamp: DateTime<Utc>,
        reading: FlowReading,
    ) -> Self {
        let current_speed = non_negative(reading.current_speed);
        let free_flow_speed = non_negative(reading.free_flow_speed);
        let traffic_level = TrafficLevel::from_speeds(current_speed, free_flow_speed);

        Self {
            city: city.into(),
            coordinates,
            timestamp,
            current_speed,
            free_flow_speed,
            current_travel_time: reading.current_travel_time,
            free_flow_travel_time: reading.free_flow_travel_time,
            confidence: if reading.confidence.is_finite() {
                reading.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            road_closure: reading.road_closure,
            traffic_level,
            traffic_color: traffic_level.color().to_string(),
        }
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

// ── Incidents ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Minor,
    Moderate,
    Major,
}

impl Severity {
    /// TomTom `iconCategory` → severity.
    pub fn from_icon_category(category: i32) -> Self {
        match category {
            1 | 4 | 5 | 10 => Severity::Minor, // accident, rain, ice, wind
            2 | 7 | 9 => Severity::Moderate,   // fog, lane closed, road works
            3 | 6 | 8 => Severity::Major,      // dangerous conditions, jam, road closed
            _ => Severity::Info,
        }
    }
}

/// A reported traffic event. Each poll's list replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    #[serde(rename = "type")]
    pub incident_type: i32,
    pub description: String,
    pub coordinates: Coordinates,
    pub start_time: DateTime<Utc>,
    /// `None` while ongoing.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// seconds
    pub delay: u32,
    /// metres
    pub length: f64,
    pub severity: Severity,
}

/// Body of `GET /incidents/{city}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub city: String,
    pub total_incidents: usize,
    pub incidents: Vec<Incident>,
}

impl IncidentReport {
    pub fn new(city: impl Into<String>, incidents: Vec<Incident>) -> Self {
        Self {
            city: city.into(),
            total_incidents: incidents.len(),
            incidents,
        }
    }
}

// ── Dashboard ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Good,
    Moderate,
    Congested,
    Unknown,
}

/// Outcome of one upstream call inside an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Ok,
    Failed,
    TimedOut,
    /// Upstream failed; the data was carried over from the previous dashboard.
    Cached,
}

impl SourceState {
    /// Whether the matching dashboard half holds real upstream data.
    pub fn has_data(self) -> bool {
        matches!(self, SourceState::Ok | SourceState::Cached)
    }
}

/// Which halves of a dashboard are backed by live upstream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSources {
    pub flow: SourceState,
    pub incidents: SourceState,
}

impl DataSources {
    pub fn is_partial(&self) -> bool {
        self.flow != SourceState::Ok || self.incidents != SourceState::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub overall_status: OverallStatus,
    pub total_incidents: usize,
    pub avg_speed: f64,
    pub traffic_level: TrafficLevel,
}

/// Merged per-city view. Replaced wholesale on refresh, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficDashboard {
    pub city: String,
    pub timestamp: DateTime<Utc>,
    pub flow: Option<TrafficFlowSample>,
    pub incidents: Vec<Incident>,
    pub summary: DashboardSummary,
    pub data_sources: DataSources,
}

// ── Routing ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    /// metres
    pub distance: u64,
    /// seconds
    pub travel_time: u64,
    /// seconds
    pub traffic_delay: u64,
    #[serde(default)]
    pub departure_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub arrival_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub distance: u64,
    pub travel_time: u64,
    pub traffic_delay: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOption {
    pub summary: RouteSummary,
    pub legs: Vec<RouteLeg>,
}

/// Body of `GET /route`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteData {
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub routes: Vec<RouteOption>,
}

// ── Places ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub category: String,
    pub address: String,
    pub coordinates: Coordinates,
    /// metres from the city centroid
    pub distance: f64,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Body of `GET /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSearchData {
    pub query: String,
    pub city: String,
    pub total_results: usize,
    pub places: Vec<Place>,
}

impl PlaceSearchData {
    pub fn new(query: impl Into<String>, city: impl Into<String>, places: Vec<Place>) -> Self {
        Self {
            query: query.into(),
            city: city.into(),
            total_results: places.len(),
            places,
        }
    }
}

// ── API envelope ──────────────────────────────────────────────────────

/// `{ success, data?, error? }` wrapper used by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
