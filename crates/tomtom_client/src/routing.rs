//! Routing adapter (`calculateRoute` with live traffic).

use chrono::{DateTime, Utc};
use common::{Coordinates, RouteData, RouteLeg, RouteOption, RouteSummary};
use serde::Deserialize;

pub(crate) const PATH_PREFIX: &[&str] = &["routing", "1", "calculateRoute"];

/// Response from `calculateRoute/{origin}:{destination}/json`.
#[derive(Debug, Deserialize)]
pub struct RouteResponse {
    #[serde(default)]
    pub routes: Vec<TomTomRoute>,
}

#[derive(Debug, Deserialize)]
pub struct TomTomRoute {
    #[serde(default)]
    pub summary: TomTomSummary,
    #[serde(default)]
    pub legs: Vec<TomTomLeg>,
}

#[derive(Debug, Deserialize)]
pub struct TomTomLeg {
    #[serde(default)]
    pub summary: TomTomSummary,
}

#[derive(Debug, Default, Deserialize)]
pub struct TomTomSummary {
    #[serde(rename = "lengthInMeters", default)]
    pub length_in_meters: u64,
    #[serde(rename = "travelTimeInSeconds", default)]
    pub travel_time_in_seconds: u64,
    #[serde(rename = "trafficDelayInSeconds", default)]
    pub traffic_delay_in_seconds: u64,
    #[serde(rename = "departureTime", default)]
    pub departure_time: Option<String>,
    #[serde(rename = "arrivalTime", default)]
    pub arrival_time: Option<String>,
}

/// `lat,lon:lat,lon` path segment.
pub(crate) fn locations(origin: Coordinates, destination: Coordinates) -> String {
    format!("{}:{}", origin.to_query(), destination.to_query())
}

pub(crate) fn query() -> Vec<(&'static str, String)> {
    vec![
        ("traffic", "true".to_string()),
        ("routeType", "fastest".to_string()),
        ("travelMode", "car".to_string()),
        ("departAt", "now".to_string()),
        ("computeTravelTimeFor", "all".to_string()),
    ]
}

fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a TomTom routing payload into [`RouteData`].
pub fn normalize(origin: Coordinates, destination: Coordinates, resp: RouteResponse) -> RouteData {
    let routes = resp
        .routes
        .into_iter()
        .map(|route| RouteOption {
            summary: RouteSummary {
                distance: route.summary.length_in_meters,
                travel_time: route.summary.travel_time_in_seconds,
                traffic_delay: route.summary.traffic_delay_in_seconds,
                departure_time: parse_time(route.summary.departure_time.as_deref()),
                arrival_time: parse_time(route.summary.arrival_time.as_deref()),
            },
            legs: route
                .legs
                .into_iter()
                .map(|leg| RouteLeg {
                    distance: leg.summary.length_in_meters,
                    travel_time: leg.summary.travel_time_in_seconds,
                    traffic_delay: leg.summary.traffic_delay_in_seconds,
                })
                .collect(),
        })
        .collect();

    RouteData {
        origin,
        destination,
        routes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_route() {
        let raw = r#"{
            "formatVersion": "0.0.12",
            "routes": [{
                "summary": {
                    "lengthInMeters": 375120,
                    "travelTimeInSeconds": 13210,
                    "trafficDelayInSeconds": 540,
                    "departureTime": "2026-02-13T06:00:00+05:00",
                    "arrivalTime": "2026-02-13T09:40:10+05:00"
                },
                "legs": [{
                    "summary": {
                        "lengthInMeters": 375120,
                        "travelTimeInSeconds": 13210,
                        "trafficDelayInSeconds": 540
                    }
                }]
            }]
        }"#;
        let resp: RouteResponse = serde_json::from_str(raw).expect("should parse");
        let origin = Coordinates::new(31.5204, 74.3587).unwrap();
        let destination = Coordinates::new(33.6844, 73.0479).unwrap();
        let data = normalize(origin, destination, resp);

        assert_eq!(data.routes.len(), 1);
        let route = &data.routes[0];
        assert_eq!(route.summary.distance, 375_120);
        assert_eq!(route.summary.traffic_delay, 540);
        assert_eq!(
            route.summary.departure_time.map(|t| t.to_rfc3339()),
            Some("2026-02-13T01:00:00+00:00".to_string())
        );
        assert_eq!(route.legs.len(), 1);
        assert_eq!(route.legs[0].travel_time, 13_210);
    }

    #[test]
    fn test_locations_segment() {
        let origin = Coordinates::new(31.5, 74.3).unwrap();
        let destination = Coordinates::new(33.6, 73.0).unwrap();
        assert_eq!(locations(origin, destination), "31.5,74.3:33.6,73");
    }
}
