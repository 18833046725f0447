//! Service configuration types.

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// TomTom API key. Empty means "unconfigured".
    #[serde(default)]
    pub tomtom_api_key: String,

    /// Upstream provider endpoints and limits.
    #[serde(default)]
    pub providers: ProviderConfig,

    /// Dashboard cache parameters.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Timing parameters.
    #[serde(default)]
    pub timing: TimingConfig,

    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Supported cities.
    #[serde(default = "default_cities")]
    pub cities: Vec<CityConfig>,
}

/// Configuration for a single city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    /// Display name, also the lookup key (case-insensitive).
    pub name: String,
    /// Latitude of the centroid.
    pub lat: f64,
    /// Longitude of the centroid.
    pub lon: f64,
    /// Suggested map zoom for the widget.
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

/// Unit TomTom reports speeds in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    Kmph,
    Mph,
}

impl SpeedUnit {
    /// Value of TomTom's `unit=` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            SpeedUnit::Kmph => "KMPH",
            SpeedUnit::Mph => "MPH",
        }
    }

    /// Convert a speed in this unit to km/h.
    pub fn to_kmph(&self, speed: f64) -> f64 {
        match self {
            SpeedUnit::Kmph => speed,
            SpeedUnit::Mph => speed * 1.609_344,
        }
    }
}

/// Upstream endpoints. Per-kind URLs fall back to `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub flow_base_url: Option<String>,

    #[serde(default)]
    pub incidents_base_url: Option<String>,

    #[serde(default)]
    pub routing_base_url: Option<String>,

    #[serde(default)]
    pub search_base_url: Option<String>,

    #[serde(default = "default_speed_unit")]
    pub speed_unit: SpeedUnit,

    /// Outbound request budget shared by all adapters.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Serve synthetic data when no API key is configured.
    #[serde(default = "default_true")]
    pub use_mock_when_unconfigured: bool,

    /// Half-width of the incidents bounding box, in degrees.
    #[serde(default = "default_incident_radius_deg")]
    pub incident_radius_deg: f64,
}

impl ProviderConfig {
    pub fn flow_url(&self) -> &str {
        self.flow_base_url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn incidents_url(&self) -> &str {
        self.incidents_base_url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn routing_url(&self) -> &str {
        self.routing_base_url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn search_url(&self) -> &str {
        self.search_base_url.as_deref().unwrap_or(&self.base_url)
    }
}

/// Dashboard cache parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age after which an entry is served as stale and refreshed.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Max wait on an in-flight refresh before falling back.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

/// Timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Per upstream call.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_zoom() -> u8 {
    11
}

fn default_base_url() -> String {
    "https://api.tomtom.com".into()
}
fn default_speed_unit() -> SpeedUnit {
    SpeedUnit::Kmph
}
fn default_requests_per_second() -> u32 {
    5
}
fn default_incident_radius_deg() -> f64 {
    0.18
}

fn default_ttl() -> u64 {
    120
}
fn default_lock_timeout() -> u64 {
    10_000
}

fn default_call_timeout() -> u64 {
    5_000
}
fn default_heartbeat_interval() -> u64 {
    60
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".into()
}

fn city(name: &str, lat: f64, lon: f64, zoom: u8) -> CityConfig {
    CityConfig {
        name: name.into(),
        lat,
        lon,
        zoom,
    }
}

fn default_cities() -> Vec<CityConfig> {
    vec![
        city("Karachi", 24.8607, 67.0011, 11),
        city("Lahore", 31.5204, 74.3587, 11),
        city("Islamabad", 33.6844, 73.0479, 11),
        city("Rawalpindi", 33.5651, 73.0169, 12),
        city("Faisalabad", 31.4504, 73.1350, 11),
        city("Multan", 30.1575, 71.5249, 11),
        city("Peshawar", 34.0151, 71.5249, 11),
        city("Quetta", 30.1798, 66.9750, 11),
        city("Sialkot", 32.4945, 74.5229, 12),
        city("Gujranwala", 32.1877, 74.1945, 12),
        city("Hyderabad", 25.3960, 68.3578, 11),
        city("Bahawalpur", 29.4000, 71.6833, 11),
        city("Sargodha", 32.0836, 72.6711, 11),
        city("Sukkur", 27.7058, 68.8574, 11),
        city("Larkana", 27.5590, 68.2120, 11),
    ]
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            flow_base_url: None,
            incidents_base_url: None,
            routing_base_url: None,
            search_base_url: None,
            speed_unit: default_speed_unit(),
            requests_per_second: default_requests_per_second(),
            use_mock_when_unconfigured: default_true(),
            incident_radius_deg: default_incident_radius_deg(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tomtom_api_key: String::new(),
            providers: ProviderConfig::default(),
            cache: CacheConfig::default(),
            timing: TimingConfig::default(),
            server: ServerConfig::default(),
            cities: default_cities(),
        }
    }
}
