//! Row-level representation of persisted measurements.
//!
//! Pollutant values are stored as `NUMERIC` for precision and mapped through
//! `sqlx::types::Decimal`; index levels are stored by their stable enum name.

use chrono::{DateTime, Utc};
use num_traits::{FromPrimitive, ToPrimitive};
use serde::Serialize;
use sqlx::types::Decimal;
use tracing::warn;

use crate::models::{AirQualityLevel, Measurement};

/// A measurement structured for storage in PostgreSQL.
/// Derives `sqlx::FromRow` for easy mapping from query results.
#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
pub struct MeasurementRecord {
    /// Primary key (auto-generated by the database, None before insertion).
    pub id: Option<i32>,
    pub station_id: i32,
    pub station_name: String,
    pub measurement_date: DateTime<Utc>,

    pub overall_index_level: Option<String>,
    pub so2_index_level: Option<String>,
    pub no2_index_level: Option<String>,
    pub pm10_index_level: Option<String>,
    pub pm25_index_level: Option<String>,

    /// Pollutant values stored as `Decimal` for precision.
    pub pm10_value: Option<Decimal>,
    pub pm25_value: Option<Decimal>,
    pub so2_value: Option<Decimal>,
    pub no2_value: Option<Decimal>,
    pub co_value: Option<Decimal>,
    pub o3_value: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

/// Converts a pollutant value to `Decimal`, dropping it with a warning when
/// the conversion cannot represent the number.
fn to_decimal(value: Option<f64>, field: &str, station_id: i32) -> Option<Decimal> {
    value.and_then(|v| {
        let converted = Decimal::from_f64(v);
        if converted.is_none() {
            warn!(
                "Could not convert f64 {} to Decimal precisely for {} (station {}). Dropping value.",
                v, field, station_id
            );
        }
        converted
    })
}

impl MeasurementRecord {
    /// Maps a canonical measurement to its row shape.
    pub fn from_domain(m: &Measurement) -> Self {
        Self {
            id: m.id,
            station_id: m.station_id,
            station_name: m.station_name.clone(),
            measurement_date: m.measurement_date,
            overall_index_level: m.overall_index_level.map(|l| l.as_str().to_string()),
            so2_index_level: m.so2_index_level.map(|l| l.as_str().to_string()),
            no2_index_level: m.no2_index_level.map(|l| l.as_str().to_string()),
            pm10_index_level: m.pm10_index_level.map(|l| l.as_str().to_string()),
            pm25_index_level: m.pm25_index_level.map(|l| l.as_str().to_string()),
            pm10_value: to_decimal(m.pm10_value, "pm10_value", m.station_id),
            pm25_value: to_decimal(m.pm25_value, "pm25_value", m.station_id),
            so2_value: to_decimal(m.so2_value, "so2_value", m.station_id),
            no2_value: to_decimal(m.no2_value, "no2_value", m.station_id),
            co_value: to_decimal(m.co_value, "co_value", m.station_id),
            o3_value: to_decimal(m.o3_value, "o3_value", m.station_id),
            created_at: m.created_at,
        }
    }

    /// Maps a row back to the canonical measurement.
    ///
    /// An unrecognized stored level name degrades to `None` rather than
    /// failing the read.
    pub fn into_domain(self) -> Measurement {
        Measurement {
            id: self.id,
            station_id: self.station_id,
            station_name: self.station_name,
            measurement_date: self.measurement_date,
            overall_index_level: parse_level(self.overall_index_level),
            so2_index_level: parse_level(self.so2_index_level),
            no2_index_level: parse_level(self.no2_index_level),
            pm10_index_level: parse_level(self.pm10_index_level),
            pm25_index_level: parse_level(self.pm25_index_level),
            pm10_value: self.pm10_value.and_then(|d| d.to_f64()),
            pm25_value: self.pm25_value.and_then(|d| d.to_f64()),
            so2_value: self.so2_value.and_then(|d| d.to_f64()),
            no2_value: self.no2_value.and_then(|d| d.to_f64()),
            co_value: self.co_value.and_then(|d| d.to_f64()),
            o3_value: self.o3_value.and_then(|d| d.to_f64()),
            created_at: self.created_at,
        }
    }
}

fn parse_level(name: Option<String>) -> Option<AirQualityLevel> {
    name.as_deref().and_then(|n| {
        let level = AirQualityLevel::from_name(n);
        if level.is_none() {
            warn!("Unknown air quality level from database: {}", n);
        }
        level
    })
}
