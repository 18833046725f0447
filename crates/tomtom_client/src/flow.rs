//! Traffic Flow adapter (`flowSegmentData`).

use chrono::{DateTime, Utc};
use common::config::SpeedUnit;
use common::{City, Error, FlowReading, TrafficFlowSample};
use serde::Deserialize;
use tracing::debug;

use crate::client::PROVIDER;

pub(crate) const PATH: &[&str] = &[
    "traffic",
    "services",
    "4",
    "flowSegmentData",
    "absolute",
    "10",
    "json",
];

/// Response from `flowSegmentData/absolute/10/json`.
#[derive(Debug, Deserialize)]
pub struct FlowResponse {
    #[serde(rename = "flowSegmentData", default)]
    pub flow_segment_data: Option<FlowSegmentData>,
}

#[derive(Debug, Deserialize)]
pub struct FlowSegmentData {
    /// Functional road class of the matched segment (`FRC0`..`FRC6`).
    #[serde(default)]
    pub frc: Option<String>,
    #[serde(rename = "currentSpeed", default)]
    pub current_speed: f64,
    #[serde(rename = "freeFlowSpeed", default)]
    pub free_flow_speed: f64,
    #[serde(rename = "currentTravelTime", default)]
    pub current_travel_time: f64,
    #[serde(rename = "freeFlowTravelTime", default)]
    pub free_flow_travel_time: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(rename = "roadClosure", default)]
    pub road_closure: bool,
}

pub(crate) fn query(city: &City, unit: SpeedUnit) -> Vec<(&'static str, String)> {
    vec![
        ("point", city.coordinates.to_query()),
        ("unit", unit.as_query().to_string()),
    ]
}

fn seconds(raw: f64) -> u32 {
    if raw.is_finite() && raw > 0.0 {
        raw.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Convert a TomTom flow payload into a [`TrafficFlowSample`] in km/h.
pub fn normalize(
    city: &City,
    unit: SpeedUnit,
    resp: FlowResponse,
    now: DateTime<Utc>,
) -> Result<TrafficFlowSample, Error> {
    let data = resp.flow_segment_data.ok_or_else(|| Error::UpstreamUnavailable {
        provider: PROVIDER.into(),
        message: format!("no flow segment data for {}", city.name),
    })?;
    debug!(
        "Flow segment for {}: frc={} closure={}",
        city.name,
        data.frc.as_deref().unwrap_or("?"),
        data.road_closure
    );

    Ok(TrafficFlowSample::new(
        city.name.clone(),
        city.coordinates,
        now,
        FlowReading {
            current_speed: unit.to_kmph(data.current_speed),
            free_flow_speed: unit.to_kmph(data.free_flow_speed),
            current_travel_time: seconds(data.current_travel_time),
            free_flow_travel_time: seconds(data.free_flow_travel_time),
            confidence: data.confidence,
            road_closure: data.road_closure,
        },
    ))
}
