//! Places search adapter (fuzzy search around a city).

use common::{City, Coordinates, Place, PlaceSearchData};
use serde::Deserialize;

pub(crate) const PATH_PREFIX: &[&str] = &["search", "2", "search"];

const SEARCH_RADIUS_M: u32 = 20_000;
const RESULT_LIMIT: u32 = 20;

/// Response from `search/2/search/{query}.json`.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub dist: f64,
    #[serde(default)]
    pub poi: Option<Poi>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub position: Option<Position>,
}

#[derive(Debug, Deserialize)]
pub struct Poi {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Address {
    #[serde(rename = "freeformAddress", default)]
    pub freeform_address: String,
}

#[derive(Debug, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

pub(crate) fn query(city: &City) -> Vec<(&'static str, String)> {
    vec![
        ("lat", city.coordinates.lat.to_string()),
        ("lon", city.coordinates.lon.to_string()),
        ("radius", SEARCH_RADIUS_M.to_string()),
        ("limit", RESULT_LIMIT.to_string()),
        ("countrySet", "PK".to_string()),
        ("language", "en-US".to_string()),
    ]
}

/// Convert a TomTom search payload into [`PlaceSearchData`].
///
/// Results without a valid position are dropped.
pub fn normalize(query: &str, city: &City, resp: SearchResponse) -> PlaceSearchData {
    let places = resp
        .results
        .into_iter()
        .filter_map(|result| {
            let position = result.position?;
            let coordinates = Coordinates::new(position.lat, position.lon).ok()?;
            let address = result
                .address
                .map(|a| a.freeform_address)
                .unwrap_or_default();
            let (name, category, phone, url) = match result.poi {
                Some(poi) => (
                    poi.name,
                    poi.categories.into_iter().next().unwrap_or_default(),
                    poi.phone,
                    poi.url,
                ),
                None => (address.clone(), String::new(), None, None),
            };

            Some(Place {
                id: result.id,
                name,
                category,
                address,
                coordinates,
                distance: result.dist,
                phone,
                url,
            })
        })
        .collect();

    PlaceSearchData::new(query, city.name.clone(), places)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CityRegistry, ServiceConfig};

    #[test]
    fn test_normalize_search() {
        let raw = r#"{
            "summary": {"query": "hospital", "numResults": 2},
            "results": [
                {
                    "type": "POI",
                    "id": "PK/POI/p0/1234",
                    "dist": 2310.7,
                    "poi": {
                        "name": "Shaukat Khanum Memorial Hospital",
                        "phone": "+92 42 35905000",
                        "categories": ["hospital", "medical"]
                    },
                    "address": {"freeformAddress": "7A Block R-3, Johar Town, Lahore"},
                    "position": {"lat": 31.4497, "lon": 74.2666}
                },
                {
                    "type": "Street",
                    "id": "PK/STR/1",
                    "address": {"freeformAddress": "Hospital Road, Lahore"},
                    "position": {"lat": 31.57, "lon": 74.31}
                },
                {
                    "type": "POI",
                    "id": "broken",
                    "poi": {"name": "Nowhere"}
                }
            ]
        }"#;
        let resp: SearchResponse = serde_json::from_str(raw).expect("should parse");
        let reg = CityRegistry::from_config(&ServiceConfig::default().cities).unwrap();
        let data = normalize("hospital", reg.resolve("lahore").unwrap(), resp);

        assert_eq!(data.city, "Lahore");
        assert_eq!(data.query, "hospital");
        assert_eq!(data.total_results, 2);
        assert_eq!(data.places[0].category, "hospital");
        assert_eq!(data.places[0].phone.as_deref(), Some("+92 42 35905000"));
        assert_eq!(data.places[1].name, "Hospital Road, Lahore");
        assert!(data.places[1].url.is_none());
    }
}
