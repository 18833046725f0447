//! Traffic Incidents adapter (`incidentDetails` v5).

use chrono::{DateTime, Utc};
use common::{City, Coordinates, Incident, Severity};
use serde::Deserialize;
use tracing::debug;

pub(crate) const PATH: &[&str] = &["traffic", "services", "5", "incidentDetails"];

const FIELDS: &str = "{incidents{type,geometry{type,coordinates},properties{id,iconCategory,\
magnitudeOfDelay,events{description,code,iconCategory},startTime,endTime,from,to,length,delay}}}";
const ALL_CATEGORIES: &str = "0,1,2,3,4,5,6,7,8,9,10,11,14";

/// Response from `incidentDetails`.
#[derive(Debug, Deserialize)]
pub struct IncidentsResponse {
    #[serde(default)]
    pub incidents: Vec<IncidentFeature>,
}

#[derive(Debug, Deserialize)]
pub struct IncidentFeature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: IncidentProperties,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub coordinates: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncidentProperties {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "iconCategory", default)]
    pub icon_category: i32,
    #[serde(default)]
    pub events: Vec<IncidentEvent>,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<String>,
    #[serde(rename = "endTime", default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub delay: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct IncidentEvent {
    #[serde(default)]
    pub description: String,
}

pub(crate) fn query(city: &City, radius_deg: f64) -> Vec<(&'static str, String)> {
    vec![
        ("bbox", city.bounding_box(radius_deg)),
        ("fields", FIELDS.to_string()),
        ("language", "en-US".to_string()),
        ("categoryFilter", ALL_CATEGORIES.to_string()),
        ("timeValidityFilter", "present".to_string()),
    ]
}

fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn lon_lat(value: &serde_json::Value) -> Option<Coordinates> {
    let pair = value.as_array()?;
    let lon = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    Coordinates::new(lat, lon).ok()
}

/// The Point, or the first vertex of a LineString.
fn location(geometry: &Geometry) -> Option<Coordinates> {
    match geometry.kind.as_str() {
        "Point" => lon_lat(&geometry.coordinates),
        "LineString" => lon_lat(geometry.coordinates.as_array()?.first()?),
        _ => None,
    }
}

fn describe(props: &IncidentProperties) -> String {
    let events: Vec<&str> = props
        .events
        .iter()
        .map(|e| e.description.trim())
        .filter(|d| !d.is_empty())
        .collect();
    let mut text = events.join("; ");

    if let (Some(from), Some(to)) = (props.from.as_deref(), props.to.as_deref()) {
        if text.is_empty() {
            text = format!("{from} → {to}");
        } else {
            text = format!("{text} ({from} → {to})");
        }
    }
    text
}

/// Convert a TomTom incident payload into [`Incident`]s.
///
/// Incidents without a usable geometry are placed at the city centroid;
/// a missing start time is taken as `now`.
pub fn normalize(city: &City, resp: IncidentsResponse, now: DateTime<Utc>) -> Vec<Incident> {
    resp.incidents
        .into_iter()
        .map(|feature| {
            let props = feature.properties;
            let coordinates = feature
                .geometry
                .as_ref()
                .and_then(location)
                .unwrap_or_else(|| {
                    debug!(
                        "Incident {} has no usable geometry, using {} centroid",
                        props.id, city.name
                    );
                    city.coordinates
                });

            Incident {
                description: describe(&props),
                id: props.id,
                incident_type: props.icon_category,
                coordinates,
                start_time: parse_time(props.start_time.as_deref()).unwrap_or(now),
                end_time: parse_time(props.end_time.as_deref()),
                delay: props
                    .delay
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .map(|d| d.round().min(u32::MAX as f64) as u32)
                    .unwrap_or(0),
                length: props
                    .length
                    .filter(|l| l.is_finite() && *l > 0.0)
                    .unwrap_or(0.0),
                severity: Severity::from_icon_category(props.icon_category),
            }
        })
        .collect()
}
