//! Provides the normalizing client for the GIOS air quality API.
//!
//! The upstream network publishes JSON whose container keys and field names
//! vary across API generations and languages. This client resolves that
//! variance through ordered candidate-key tables and maps raw responses to
//! the canonical domain model. Failures never cross this boundary: any
//! network or parse problem degrades to an empty or absent result.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::models::{
    AirQualityIndex, GiosAqIndexDto, GiosDataValueDto, GiosSensorDto, GiosStationDto, Reading,
    SensorMeasurement, Station,
};

use super::provider::AirQualityProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.gios.gov.pl/pjp-api/rest";

const USER_AGENT_VALUE: &str = "airmon/0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const URI_STATION_FIND_ALL: &str = "/station/findAll";

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UNKNOWN_PARAMETER: &str = "Nieznany parametr";
const NO_DATA: &str = "Brak danych";
const PARAM_NA: &str = "N/A";

const DEFAULT_COORDINATE: f64 = 0.0;
const DEFAULT_STATION_ID: i32 = 0;

/// Ordered candidate container keys for each payload concept, tried in
/// sequence until one resolves. New upstream schema variants are additive
/// entries here, not new branching logic.
#[derive(Debug, Clone)]
pub struct SchemaKeys {
    pub station_list: Vec<&'static str>,
    pub index_object: Vec<&'static str>,
    pub sensor_list: Vec<&'static str>,
    pub reading_list: Vec<&'static str>,
}

impl Default for SchemaKeys {
    fn default() -> Self {
        Self {
            station_list: vec!["Lista stacji pomiarowych", "lista", "list", "data"],
            index_object: vec!["AqIndex", "Indeks jakości powietrza"],
            sensor_list: vec![
                "Lista stanowisk pomiarowych dla podanej stacji",
                "Lista stanowisk pomiarowych",
                "Lista stanowisk",
            ],
            reading_list: vec![
                "Lista danych pomiarowych",
                "values",
                "Dane pomiarowe",
                "lista",
                "data",
            ],
        }
    }
}

/// An asynchronous client for the GIOS air quality API.
pub struct GiosClient {
    client: Client,
    base_url: String,
    keys: SchemaKeys,
}

impl GiosClient {
    /// Creates a new client against the given base URL with the default
    /// schema-key tables and a bounded per-request timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT_VALUE)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            keys: SchemaKeys::default(),
        })
    }

    /// Replaces the candidate-key tables, e.g. when a deployment needs to
    /// recognize an upstream schema variant before a release catches up.
    pub fn with_schema_keys(mut self, keys: SchemaKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Fetches a path and parses the body as JSON. All failures are logged
    /// and collapse to `None`.
    async fn fetch_json(&self, path: &str) -> Option<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("GIOS request to {} failed: {}", url, e);
                return None;
            },
        };
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                error!("GIOS request to {} returned error status: {}", url, e);
                return None;
            },
        };
        match response.json::<Value>().await {
            Ok(root) => Some(root),
            Err(e) => {
                error!("Error parsing GIOS response from {}: {}", url, e);
                None
            },
        }
    }

    /// Tries the candidate keys in order, resolving each by recursive
    /// lookup anywhere in the tree (upstream nests containers at varying
    /// depths across generations).
    fn resolve_node<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|key| find_node(root, key))
    }

    async fn fetch_sensors(&self, station_id: i32) -> Vec<GiosSensorDto> {
        let path = format!("/station/sensors/{}", station_id);
        let Some(root) = self.fetch_json(&path).await else {
            return Vec::new();
        };
        debug!("GIOS sensors response for station {}: {}", station_id, root);

        let list_node = Self::resolve_node(&root, &self.keys.sensor_list).unwrap_or(&root);
        if !list_node.is_array() {
            return Vec::new();
        }
        match serde_json::from_value(list_node.clone()) {
            Ok(sensors) => sensors,
            Err(e) => {
                error!("Error mapping sensors for station {}: {}", station_id, e);
                Vec::new()
            },
        }
    }

    async fn fetch_readings(&self, sensor_id: i32) -> Vec<Reading> {
        let path = format!("/data/getData/{}", sensor_id);
        let Some(root) = self.fetch_json(&path).await else {
            return Vec::new();
        };
        debug!("GIOS data response for sensor {}: {}", sensor_id, root);

        let values_node = match Self::resolve_node(&root, &self.keys.reading_list) {
            Some(node) if node.is_array() => node,
            _ => return Vec::new(),
        };
        let values: Vec<GiosDataValueDto> = match serde_json::from_value(values_node.clone()) {
            Ok(values) => values,
            Err(e) => {
                error!("Error mapping readings for sensor {}: {}", sensor_id, e);
                return Vec::new();
            },
        };

        // Null values are frequent upstream; entries with an unparsable
        // timestamp are dropped instead of failing the whole series.
        values
            .into_iter()
            .filter(|v| v.value.is_some())
            .filter_map(|v| {
                let date = v.date.as_deref().and_then(parse_upstream_date)?;
                Some(Reading {
                    date,
                    value: v.value,
                })
            })
            .collect()
    }

    fn map_station(dto: GiosStationDto) -> Station {
        Station {
            id: dto.id.unwrap_or(DEFAULT_STATION_ID),
            name: dto.station_name.unwrap_or_default(),
            city: dto.city_name.unwrap_or_default(),
            address: dto.address_street,
            latitude: parse_coordinate(dto.gegr_lat.as_deref()),
            longitude: parse_coordinate(dto.gegr_lon.as_deref()),
        }
    }

    fn map_index(dto: GiosAqIndexDto, station_id: i32) -> Option<AirQualityIndex> {
        let calculation_date = match dto.st_calc_date.as_deref() {
            Some(raw) => parse_upstream_date(raw)?,
            None => Utc::now(),
        };
        Some(AirQualityIndex {
            station_id,
            calculation_date,
            overall_level: level_name(dto.st_index_level),
            so2_level: level_name(dto.so2_index_level),
            no2_level: level_name(dto.no2_index_level),
            pm10_level: level_name(dto.pm10_index_level),
        })
    }
}

impl AirQualityProvider for GiosClient {
    async fn find_all_stations(&self) -> Vec<Station> {
        let Some(root) = self.fetch_json(URI_STATION_FIND_ALL).await else {
            return Vec::new();
        };
        debug!("GIOS stations response: {}", root);

        // If no known container key matches and the root itself is an
        // array, use it directly.
        let list_node = match Self::resolve_node(&root, &self.keys.station_list) {
            Some(node) => node,
            None if root.is_array() => &root,
            None => {
                warn!("Not found stations list in response");
                return Vec::new();
            },
        };
        if !list_node.is_array() {
            warn!("Not found stations list in response");
            return Vec::new();
        }

        let dtos: Vec<GiosStationDto> = match serde_json::from_value(list_node.clone()) {
            Ok(dtos) => dtos,
            Err(e) => {
                error!("Error mapping stations: {}", e);
                return Vec::new();
            },
        };
        dtos.into_iter().map(Self::map_station).collect()
    }

    async fn find_index_by_station_id(&self, station_id: i32) -> Option<AirQualityIndex> {
        let path = format!("/aqindex/getIndex/{}", station_id);
        let root = self.fetch_json(&path).await?;
        debug!("GIOS index response for station {}: {}", station_id, root);

        let mut index_node = Self::resolve_node(&root, &self.keys.index_object).unwrap_or(&root);

        // Some API generations wrap the index in a one-element array.
        if let Value::Array(items) = index_node {
            index_node = items.first()?;
        }

        let dto: GiosAqIndexDto = match serde_json::from_value(index_node.clone()) {
            Ok(dto) => dto,
            Err(e) => {
                error!(
                    "Error parsing air quality index for station {}: {}",
                    station_id, e
                );
                return None;
            },
        };

        // An object with no station identifier is the upstream all-null
        // placeholder, not real data.
        dto.id?;
        Self::map_index(dto, station_id)
    }

    async fn find_measurements_by_station_id(&self, station_id: i32) -> Vec<SensorMeasurement> {
        let sensors = self.fetch_sensors(station_id).await;
        let mut measurements = Vec::new();

        for sensor in sensors {
            let Some(sensor_id) = sensor.id else {
                continue;
            };
            let readings = self.fetch_readings(sensor_id).await;
            measurements.push(SensorMeasurement {
                sensor_id,
                param_code: sensor.param_code.unwrap_or_else(|| PARAM_NA.to_string()),
                param_name: sensor
                    .param_name
                    .unwrap_or_else(|| UNKNOWN_PARAMETER.to_string()),
                readings,
            });
        }

        measurements
    }
}

/// Depth-first lookup of the first occurrence of `key` anywhere in the tree.
fn find_node<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|child| find_node(child, key))),
        Value::Array(items) => items.iter().find_map(|child| find_node(child, key)),
        _ => None,
    }
}

/// Parses the upstream `yyyy-MM-dd HH:mm:ss` timestamp, treated as UTC.
fn parse_upstream_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Coordinates may use a comma as the decimal separator; normalize before
/// parsing and fall back to the default on failure.
fn parse_coordinate(value: Option<&str>) -> f64 {
    value
        .and_then(|raw| raw.replace(',', ".").parse::<f64>().ok())
        .unwrap_or(DEFAULT_COORDINATE)
}

fn level_name(level: Option<String>) -> String {
    level.unwrap_or_else(|| NO_DATA.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_coordinate_normalizes_comma_separator() {
        assert_eq!(parse_coordinate(Some("52,2297")), 52.2297);
        assert_eq!(parse_coordinate(Some("52.2297")), 52.2297);
    }

    #[test]
    fn parse_coordinate_defaults_on_garbage_or_absence() {
        assert_eq!(parse_coordinate(Some("not-a-number")), 0.0);
        assert_eq!(parse_coordinate(Some("")), 0.0);
        assert_eq!(parse_coordinate(None), 0.0);
    }

    #[test]
    fn parse_upstream_date_accepts_gios_format_only() {
        assert!(parse_upstream_date("2026-03-14 11:00:00").is_some());
        assert!(parse_upstream_date("2026-03-14T11:00:00Z").is_none());
        assert!(parse_upstream_date("yesterday").is_none());
    }

    #[test]
    fn find_node_searches_nested_containers() {
        let root = json!({
            "meta": {"page": 1},
            "payload": {"lista": [1, 2, 3]}
        });
        let node = find_node(&root, "lista").unwrap();
        assert!(node.is_array());
        assert!(find_node(&root, "absent").is_none());
    }
}
