//! Static registry of supported cities.

use std::collections::HashMap;

use crate::config::CityConfig;
use crate::{Coordinates, Error};

/// A supported city. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub name: String,
    pub coordinates: Coordinates,
    pub zoom: u8,
}

impl City {
    /// `minLon,minLat,maxLon,maxLat` around the centroid.
    pub fn bounding_box(&self, radius_deg: f64) -> String {
        let c = self.coordinates;
        format!(
            "{},{},{},{}",
            (c.lon - radius_deg).max(-180.0),
            (c.lat - radius_deg).max(-90.0),
            (c.lon + radius_deg).min(180.0),
            (c.lat + radius_deg).min(90.0),
        )
    }
}

/// Case-insensitive lookup from city name to [`City`].
#[derive(Debug, Clone)]
pub struct CityRegistry {
    cities: Vec<City>,
    by_key: HashMap<String, usize>,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl CityRegistry {
    /// Build from config. Duplicate names and out-of-range coordinates are rejected.
    pub fn from_config(configs: &[CityConfig]) -> Result<Self, Error> {
        let mut cities = Vec::with_capacity(configs.len());
        let mut by_key = HashMap::with_capacity(configs.len());

        for cfg in configs {
            let k = key(&cfg.name);
            if k.is_empty() {
                return Err(Error::Config("city name must not be empty".into()));
            }
            if by_key.contains_key(&k) {
                return Err(Error::Config(format!("duplicate city: {}", cfg.name)));
            }
            let coordinates = Coordinates::new(cfg.lat, cfg.lon)
                .map_err(|e| Error::Config(format!("city {}: {}", cfg.name, e)))?;

            by_key.insert(k, cities.len());
            cities.push(City {
                name: title_case(&cfg.name),
                coordinates,
                zoom: cfg.zoom,
            });
        }

        Ok(Self { cities, by_key })
    }

    pub fn get(&self, name: &str) -> Option<&City> {
        self.by_key.get(&key(name)).map(|&i| &self.cities[i])
    }

    /// Like [`get`](Self::get) but fails with `InvalidCity`.
    pub fn resolve(&self, name: &str) -> Result<&City, Error> {
        self.get(name)
            .ok_or_else(|| Error::InvalidCity(name.trim().to_string()))
    }

    /// Canonical names, in configuration order.
    pub fn names(&self) -> Vec<String> {
        self.cities.iter().map(|c| c.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &City> {
        self.cities.iter()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}
