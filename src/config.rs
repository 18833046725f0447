//! Configuration loader: merges defaults, config.toml, .env and environment.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use common::config::{ServiceConfig, SpeedUnit};
use common::{Coordinates, Error};

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::Config(format!("{env_name} must be an integer > 0"))),
    }
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.cache.ttl_secs == 0 {
        issues.push("cache.ttl_secs must be > 0".into());
    }
    if config.cache.lock_timeout_ms == 0 {
        issues.push("cache.lock_timeout_ms must be > 0".into());
    }
    if config.timing.call_timeout_ms == 0 {
        issues.push("timing.call_timeout_ms must be > 0".into());
    }
    if config.timing.heartbeat_interval_secs == 0 {
        issues.push("timing.heartbeat_interval_secs must be > 0".into());
    }
    if config.providers.requests_per_second == 0 {
        issues.push("providers.requests_per_second must be > 0".into());
    }
    let radius = config.providers.incident_radius_deg;
    if !(radius > 0.0 && radius <= 5.0) {
        issues.push("providers.incident_radius_deg must be in (0,5]".into());
    }

    if config.cities.is_empty() {
        issues.push("cities must contain at least one city".into());
    }
    let mut seen = HashSet::new();
    for city in &config.cities {
        let key = city.name.trim().to_lowercase();
        if key.is_empty() {
            issues.push("city names must not be empty".into());
        } else if !seen.insert(key) {
            issues.push(format!("duplicate city: {}", city.name));
        }
        if let Err(e) = Coordinates::new(city.lat, city.lon) {
            issues.push(format!("city {}: {}", city.name, e));
        }
    }

    if config.server.bind_addr.parse::<SocketAddr>().is_err() {
        issues.push(format!(
            "server.bind_addr is not a socket address: {}",
            config.server.bind_addr
        ));
    }

    if config.tomtom_api_key.trim().is_empty() && !config.providers.use_mock_when_unconfigured {
        issues.push("TOMTOM_API_KEY is required when mock fallback is disabled".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply environment overrides, reading variables through `var`.
fn apply_env_overrides(
    config: &mut ServiceConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(key) = var("TOMTOM_API_KEY") {
        config.tomtom_api_key = key.trim().to_string();
    }
    if let Some(url) = var("TOMTOM_BASE_URL").and_then(non_empty) {
        config.providers.base_url = url;
    }
    if let Some(url) = var("TRAFFICWISE_FLOW_BASE_URL").and_then(non_empty) {
        config.providers.flow_base_url = Some(url);
    }
    if let Some(url) = var("TRAFFICWISE_INCIDENTS_BASE_URL").and_then(non_empty) {
        config.providers.incidents_base_url = Some(url);
    }
    if let Some(url) = var("TRAFFICWISE_ROUTING_BASE_URL").and_then(non_empty) {
        config.providers.routing_base_url = Some(url);
    }
    if let Some(url) = var("TRAFFICWISE_SEARCH_BASE_URL").and_then(non_empty) {
        config.providers.search_base_url = Some(url);
    }
    if let Some(unit) = var("TRAFFICWISE_SPEED_UNIT") {
        config.providers.speed_unit = match unit.trim().to_ascii_lowercase().as_str() {
            "kmph" | "kmh" => SpeedUnit::Kmph,
            "mph" => SpeedUnit::Mph,
            _ => {
                return Err(Error::Config(
                    "TRAFFICWISE_SPEED_UNIT must be one of: kmph, mph".into(),
                ));
            }
        };
    }
    if let Some(raw) = var("TRAFFICWISE_REQUESTS_PER_SECOND") {
        let rps = parse_positive_u64(&raw, "TRAFFICWISE_REQUESTS_PER_SECOND")?;
        config.providers.requests_per_second = u32::try_from(rps).map_err(|_| {
            Error::Config("TRAFFICWISE_REQUESTS_PER_SECOND is too large".into())
        })?;
    }
    if let Some(raw) = var("TRAFFICWISE_USE_MOCK") {
        config.providers.use_mock_when_unconfigured = parse_bool(&raw);
    }
    if let Some(raw) = var("TRAFFICWISE_CACHE_TTL_SECS") {
        config.cache.ttl_secs = parse_positive_u64(&raw, "TRAFFICWISE_CACHE_TTL_SECS")?;
    }
    if let Some(raw) = var("TRAFFICWISE_LOCK_TIMEOUT_MS") {
        config.cache.lock_timeout_ms = parse_positive_u64(&raw, "TRAFFICWISE_LOCK_TIMEOUT_MS")?;
    }
    if let Some(raw) = var("TRAFFICWISE_CALL_TIMEOUT_MS") {
        config.timing.call_timeout_ms = parse_positive_u64(&raw, "TRAFFICWISE_CALL_TIMEOUT_MS")?;
    }
    if let Some(addr) = var("TRAFFICWISE_BIND_ADDR").and_then(non_empty) {
        config.server.bind_addr = addr;
    }
    Ok(())
}

/// Load service configuration from an optional TOML file and the environment.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, Error> {
    // 1. .env from the working directory or a parent.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Defaults, then the TOML file. An explicit --config path must exist.
    let mut config = ServiceConfig::default();
    let config_path = path.unwrap_or_else(|| Path::new("config.toml"));
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    } else if path.is_some() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            config_path.display()
        )));
    }

    // 3. Environment variables win.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::CityConfig;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        validate_config(&ServiceConfig::default()).unwrap();
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut cfg = ServiceConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("TOMTOM_API_KEY", " abc123 "),
                ("TRAFFICWISE_SPEED_UNIT", "MPH"),
                ("TRAFFICWISE_CACHE_TTL_SECS", "30"),
                ("TRAFFICWISE_USE_MOCK", "off"),
                ("TRAFFICWISE_FLOW_BASE_URL", "http://flow.local"),
                ("TRAFFICWISE_BIND_ADDR", "127.0.0.1:9000"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.tomtom_api_key, "abc123");
        assert_eq!(cfg.providers.speed_unit, SpeedUnit::Mph);
        assert_eq!(cfg.cache.ttl_secs, 30);
        assert!(!cfg.providers.use_mock_when_unconfigured);
        assert_eq!(cfg.providers.flow_url(), "http://flow.local");
        assert_eq!(cfg.providers.incidents_url(), "https://api.tomtom.com");
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:9000");
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn test_bad_env_values_rejected() {
        let mut cfg = ServiceConfig::default();
        let zero_ttl = env(&[("TRAFFICWISE_CACHE_TTL_SECS", "0")]);
        assert!(apply_env_overrides(&mut cfg, zero_ttl).is_err());
        let knots = env(&[("TRAFFICWISE_SPEED_UNIT", "knots")]);
        assert!(apply_env_overrides(&mut cfg, knots).is_err());
        assert!(
            apply_env_overrides(&mut cfg, env(&[("TRAFFICWISE_CALL_TIMEOUT_MS", "soon")])).is_err()
        );
    }

    #[test]
    fn test_validation_collects_issues() {
        let mut cfg = ServiceConfig::default();
        cfg.cache.ttl_secs = 0;
        cfg.providers.use_mock_when_unconfigured = false;
        cfg.server.bind_addr = "nowhere".into();
        cfg.cities.push(CityConfig {
            name: "KARACHI".into(),
            lat: 24.86,
            lon: 67.0,
            zoom: 11,
        });

        let msg = validate_config(&cfg).unwrap_err().to_string();
        assert!(msg.contains("cache.ttl_secs"));
        assert!(msg.contains("TOMTOM_API_KEY"));
        assert!(msg.contains("bind_addr"));
        assert!(msg.contains("duplicate city: KARACHI"));
    }

    #[test]
    fn test_out_of_range_city_rejected() {
        let mut cfg = ServiceConfig::default();
        cfg.cities = vec![CityConfig {
            name: "Nowhere".into(),
            lat: 120.0,
            lon: 0.0,
            zoom: 11,
        }];
        assert!(validate_config(&cfg).is_err());
    }
}
