//! Read-only geographic datasets, one region per directory under `src/geo/data`.
//!
//! Each region ships `meta.json`, `cities.geo.json` (GeoJSON points) and an
//! optional `districts.json`. Everything is embedded at compile time.

use crate::geodesy::LonLat;
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

static GEO_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/geo/data");

pub const DEFAULT_REGION: &str = "uttarakhand";

#[derive(Debug, Error)]
pub enum GeoDataError {
    #[error("unknown region '{0}'")]
    UnknownRegion(String),
    #[error("region '{region}' is missing {file}")]
    MissingFile { region: String, file: &'static str },
    #[error("region '{region}': malformed {file}: {source}")]
    Malformed {
        region: String,
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("no regions available")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlaceType {
    Town,
    DistrictHq,
    City,
    StateCapital,
    Other(String),
}

impl PlaceType {
    pub fn as_str(&self) -> &str {
        match self {
            PlaceType::Town => "town",
            PlaceType::DistrictHq => "district_hq",
            PlaceType::City => "city",
            PlaceType::StateCapital => "state_capital",
            PlaceType::Other(s) => s,
        }
    }
}

impl From<String> for PlaceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "town" => PlaceType::Town,
            "district_hq" => PlaceType::DistrictHq,
            "city" => PlaceType::City,
            "state_capital" => PlaceType::StateCapital,
            _ => PlaceType::Other(s),
        }
    }
}

impl From<PlaceType> for String {
    fn from(t: PlaceType) -> Self {
        t.as_str().to_string()
    }
}

/// Which places are eligible as targets.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TargetScope {
    #[default]
    Mixed,
    DistrictHqs,
    Cities,
}

/// A candidate target as handed to the selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolEntry {
    pub id: String,
    pub importance: f64,
    pub district_id: String,
    pub place_type: PlaceType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub id: String,
    pub name: String,
    pub importance: f64,
    pub district_id: String,
    pub place_type: PlaceType,
    pub coord: LonLat,
}

impl City {
    pub fn pool_entry(&self) -> PoolEntry {
        PoolEntry {
            id: self.id.clone(),
            importance: self.importance,
            district_id: self.district_id.clone(),
            place_type: self.place_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct District {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateMetadata {
    pub id: String,
    pub name: String,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bounds: [f64; 4],
    pub center: LonLat,
    pub cities_count: usize,
    pub districts_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateListing {
    pub id: String,
    pub label: String,
    pub meta: StateMetadata,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMeta {
    id: String,
    name: String,
    bounds: [f64; 4],
    center: LonLat,
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    properties: FeatureProps,
    geometry: PointGeometry,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureProps {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    district_id: String,
    #[serde(rename = "type")]
    place_type: PlaceType,
}

#[derive(Deserialize)]
struct PointGeometry {
    coordinates: LonLat,
}

/// Weights must be positive; anything else counts as 1.
fn normalize_importance(importance: Option<f64>) -> f64 {
    match importance {
        Some(w) if w.is_finite() && w > 0.0 => w,
        _ => 1.0,
    }
}

#[derive(Debug, Clone)]
pub struct Region {
    key: String,
    meta: RawMeta,
    cities: Vec<City>,
    districts: Vec<District>,
    city_index: HashMap<String, usize>,
}

impl Region {
    /// Build a region from its JSON documents.
    pub fn from_json(
        key: &str,
        meta_json: &str,
        cities_json: &str,
        districts_json: Option<&str>,
    ) -> Result<Self, GeoDataError> {
        let malformed = |file: &'static str| {
            let region = key.to_string();
            move |source| GeoDataError::Malformed {
                region,
                file,
                source,
            }
        };

        let meta: RawMeta = serde_json::from_str(meta_json).map_err(malformed("meta.json"))?;
        let collection: FeatureCollection =
            serde_json::from_str(cities_json).map_err(malformed("cities.geo.json"))?;
        let districts: Vec<District> = match districts_json {
            Some(json) => serde_json::from_str(json).map_err(malformed("districts.json"))?,
            None => Vec::new(),
        };

        let cities: Vec<City> = collection
            .features
            .into_iter()
            .map(|f| City {
                name: f.properties.name.unwrap_or_else(|| f.properties.id.clone()),
                id: f.properties.id,
                importance: normalize_importance(f.properties.importance),
                district_id: f.properties.district_id,
                place_type: f.properties.place_type,
                coord: f.geometry.coordinates,
            })
            .collect();

        let city_index = cities
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        Ok(Self {
            key: key.to_string(),
            meta,
            cities,
            districts,
            city_index,
        })
    }

    fn from_embedded(key: &str) -> Result<Self, GeoDataError> {
        let read = |file: &'static str| {
            GEO_DIR
                .get_file(format!("{key}/{file}"))
                .and_then(|f| f.contents_utf8())
        };
        let missing = |file: &'static str| GeoDataError::MissingFile {
            region: key.to_string(),
            file,
        };

        let meta = read("meta.json").ok_or_else(|| missing("meta.json"))?;
        let cities = read("cities.geo.json").ok_or_else(|| missing("cities.geo.json"))?;
        Self::from_json(key, meta, cities, read("districts.json"))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn metadata(&self) -> StateMetadata {
        StateMetadata {
            id: self.meta.id.clone(),
            name: self.meta.name.clone(),
            bounds: self.meta.bounds,
            center: self.meta.center,
            cities_count: self.cities.len(),
            districts_count: self.districts.len(),
        }
    }

    /// Candidate targets for a scope. `Mixed` and `Cities` are the same set.
    /// The state capital also heads its district, so `DistrictHqs` keeps it.
    pub fn weighted_city_pool(&self, scope: TargetScope) -> Vec<PoolEntry> {
        self.cities
            .iter()
            .filter(|c| match scope {
                TargetScope::DistrictHqs => matches!(
                    c.place_type,
                    PlaceType::DistrictHq | PlaceType::StateCapital
                ),
                TargetScope::Mixed | TargetScope::Cities => true,
            })
            .map(City::pool_entry)
            .collect()
    }

    pub fn find_city(&self, id: &str) -> Option<&City> {
        self.city_index.get(id).map(|&i| &self.cities[i])
    }

    pub fn city_coordinates(&self, id: &str) -> Option<LonLat> {
        self.find_city(id).map(|c| c.coord)
    }

    pub fn find_district(&self, id: &str) -> Option<&District> {
        self.districts.iter().find(|d| d.id == id)
    }
}

/// Source of regions and their places.
pub trait GeoDataProvider {
    fn list_states(&self) -> Vec<StateListing>;

    /// Strict lookup by region key.
    fn try_region(&self, state_id: &str) -> Result<&Region, GeoDataError>;

    /// Lookup that falls back to the default region for unknown or empty keys.
    fn region(&self, state_id: &str) -> &Region;

    fn weighted_city_pool(&self, scope: TargetScope, state_id: &str) -> Vec<PoolEntry> {
        self.region(state_id).weighted_city_pool(scope)
    }

    fn city_coordinates(&self, id: &str, state_id: &str) -> Option<LonLat> {
        self.region(state_id).city_coordinates(id)
    }

    fn state_metadata(&self, state_id: &str) -> StateMetadata {
        self.region(state_id).metadata()
    }
}

/// Region registry. Always holds at least one region.
#[derive(Debug, Clone)]
pub struct GeoData {
    regions: Vec<Region>,
    default_idx: usize,
}

impl GeoData {
    /// Load every region compiled into the binary.
    pub fn bundled() -> Result<Self, GeoDataError> {
        let mut keys: Vec<&str> = GEO_DIR
            .dirs()
            .filter_map(|d| d.path().file_name().and_then(|n| n.to_str()))
            .collect();
        keys.sort_unstable();

        let regions = keys
            .into_iter()
            .map(Region::from_embedded)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_regions(regions)
    }

    pub fn from_regions(regions: Vec<Region>) -> Result<Self, GeoDataError> {
        if regions.is_empty() {
            return Err(GeoDataError::Empty);
        }
        let default_idx = regions
            .iter()
            .position(|r| r.key == DEFAULT_REGION)
            .unwrap_or(0);
        Ok(Self {
            regions,
            default_idx,
        })
    }

}

impl GeoDataProvider for GeoData {
    fn list_states(&self) -> Vec<StateListing> {
        self.regions
            .iter()
            .map(|r| StateListing {
                id: r.key.clone(),
                label: r.meta.name.clone(),
                meta: r.metadata(),
            })
            .collect()
    }

    fn try_region(&self, state_id: &str) -> Result<&Region, GeoDataError> {
        self.regions
            .iter()
            .find(|r| r.key == state_id)
            .ok_or_else(|| GeoDataError::UnknownRegion(state_id.to_string()))
    }

    fn region(&self, state_id: &str) -> &Region {
        match self.try_region(state_id) {
            Ok(region) => region,
            Err(_) => {
                let fallback = &self.regions[self.default_idx];
                if !state_id.is_empty() {
                    log::warn!(
                        "unknown region '{state_id}', falling back to '{}'",
                        fallback.key
                    );
                }
                fallback
            }
        }
    }
}
