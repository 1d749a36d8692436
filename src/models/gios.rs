//! Wire-format structures for GIOS API responses.
//!
//! The upstream schema has grown organically: field names differ between API
//! generations and between the English and Polish renditions of the same
//! endpoint. Every field therefore carries the full alias table and is
//! optional; the normalizing adapter decides on defaults.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a JSON string or number and yields it as a string.
///
/// Coordinates in particular have been observed both as `"50,972167"` and as
/// bare numbers depending on the API generation.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

/// Accepts a JSON number or a numeric string as a station id; anything else
/// (including garbage strings) is treated as absent, which the adapter
/// defaults to 0.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }))
}

/// One entry of the station list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiosStationDto {
    #[serde(
        default,
        alias = "Identyfikator stacji",
        deserialize_with = "lenient_id"
    )]
    pub id: Option<i32>,
    #[serde(alias = "Nazwa stacji")]
    pub station_name: Option<String>,
    #[serde(default, alias = "WGS84 φ N", deserialize_with = "string_or_number")]
    pub gegr_lat: Option<String>,
    #[serde(default, alias = "WGS84 λ E", deserialize_with = "string_or_number")]
    pub gegr_lon: Option<String>,
    #[serde(alias = "Nazwa miasta")]
    pub city_name: Option<String>,
    #[serde(alias = "Ulica")]
    pub address_street: Option<String>,
}

/// The air quality index object for a station.
///
/// A missing `id` distinguishes the all-null placeholder object some API
/// generations return instead of an empty body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiosAqIndexDto {
    #[serde(alias = "Identyfikator stacji pomiarowej")]
    pub id: Option<i32>,
    #[serde(
        alias = "Data obliczenia",
        alias = "Data wykonania obliczeń indeksu"
    )]
    pub st_calc_date: Option<String>,
    #[serde(alias = "Indeks ogólny", alias = "Nazwa kategorii indeksu")]
    pub st_index_level: Option<String>,
    #[serde(
        alias = "Indeks SO2",
        alias = "Nazwa kategorii indeksu dla wskażnika SO2"
    )]
    pub so2_index_level: Option<String>,
    #[serde(
        alias = "Indeks NO2",
        alias = "Nazwa kategorii indeksu dla wskażnika NO2"
    )]
    pub no2_index_level: Option<String>,
    #[serde(
        alias = "Indeks PM10",
        alias = "Nazwa kategorii indeksu dla wskażnika PM10"
    )]
    pub pm10_index_level: Option<String>,
}

/// One entry of the per-station sensor list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiosSensorDto {
    #[serde(alias = "Identyfikator stanowiska", alias = "Identyfikator")]
    pub id: Option<i32>,
    #[serde(alias = "Wskaźnik - kod", alias = "Kod wskaźnika")]
    pub param_code: Option<String>,
    #[serde(
        alias = "Wskaźnik",
        alias = "Nazwa parametru",
        alias = "Wskaźnik - nazwa"
    )]
    pub param_name: Option<String>,
}

/// One timestamped value of a sensor's reading series.
#[derive(Debug, Clone, Deserialize)]
pub struct GiosDataValueDto {
    #[serde(alias = "data", alias = "Data")]
    pub date: Option<String>,
    #[serde(alias = "wartość", alias = "Wartość")]
    pub value: Option<f64>,
}
