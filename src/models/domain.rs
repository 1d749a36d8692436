//! Canonical domain model for air quality monitoring.
//!
//! These are the shapes the rest of the application works with after the
//! normalizing adapter has resolved the upstream schema variance. Everything
//! here is an immutable value; `Measurement` is the only persisted type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AppError, Result};

/// A fixed physical monitoring location in the GIOS network.
///
/// Stations are sourced live from upstream and never persisted on their own;
/// the station name is denormalized into each [`Measurement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: i32,
    pub name: String,
    pub city: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Air quality levels on the closed ordinal scale defined by GIOS.
///
/// Lower severity means better air. The database and API surface use the
/// enum name (e.g. `"VERY_GOOD"`); the Polish display label is only used
/// when parsing upstream index responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AirQualityLevel {
    VeryGood,
    Good,
    Moderate,
    Sufficient,
    Bad,
    VeryBad,
}

impl AirQualityLevel {
    /// All levels in declaration order (best first). The order doubles as the
    /// tie-break order for [`Statistics::most_common_level`].
    pub const ALL: [AirQualityLevel; 6] = [
        AirQualityLevel::VeryGood,
        AirQualityLevel::Good,
        AirQualityLevel::Moderate,
        AirQualityLevel::Sufficient,
        AirQualityLevel::Bad,
        AirQualityLevel::VeryBad,
    ];

    /// Severity of this level (0 = best, 5 = worst).
    pub fn severity(self) -> u8 {
        self as u8
    }

    fn polish_label(self) -> &'static str {
        match self {
            AirQualityLevel::VeryGood => "Bardzo dobry",
            AirQualityLevel::Good => "Dobry",
            AirQualityLevel::Moderate => "Umiarkowany",
            AirQualityLevel::Sufficient => "Dostateczny",
            AirQualityLevel::Bad => "Zły",
            AirQualityLevel::VeryBad => "Bardzo zły",
        }
    }

    /// Stable name used for persistence and display (e.g. `"VERY_GOOD"`).
    pub fn as_str(self) -> &'static str {
        match self {
            AirQualityLevel::VeryGood => "VERY_GOOD",
            AirQualityLevel::Good => "GOOD",
            AirQualityLevel::Moderate => "MODERATE",
            AirQualityLevel::Sufficient => "SUFFICIENT",
            AirQualityLevel::Bad => "BAD",
            AirQualityLevel::VeryBad => "VERY_BAD",
        }
    }

    /// Parses the stable enum name back from storage.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == name)
    }

    /// Parses a display label coming from the GIOS API.
    ///
    /// Matching is case-insensitive on the trimmed label. An unknown label
    /// (including the upstream "Brak danych" no-data marker) yields `None`,
    /// never an error.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.polish_label().to_lowercase() == normalized)
    }

    /// Whether this level represents good air quality (Very Good or Good).
    pub fn is_good(self) -> bool {
        matches!(self, AirQualityLevel::VeryGood | AirQualityLevel::Good)
    }

    pub fn is_better_than(self, other: AirQualityLevel) -> bool {
        self.severity() < other.severity()
    }

    pub fn is_worse_than(self, other: AirQualityLevel) -> bool {
        self.severity() > other.severity()
    }
}

/// Live air quality index for a station, as calculated upstream.
///
/// The level fields carry the raw upstream category labels; the language of
/// those labels depends on the API generation, so conversion to
/// [`AirQualityLevel`] is deferred to [`Measurement::from_index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityIndex {
    pub station_id: i32,
    pub calculation_date: DateTime<Utc>,
    pub overall_level: String,
    pub so2_level: String,
    pub no2_level: String,
    pub pm10_level: String,
}

/// A single pollutant-measuring instrument at a station with its reading
/// series, ordered as delivered by upstream (most recent first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMeasurement {
    pub sensor_id: i32,
    /// Pollutant code, e.g. "PM10", "NO2".
    pub param_code: String,
    /// Pollutant display name, e.g. "Pył zawieszony PM10".
    pub param_name: String,
    pub readings: Vec<Reading>,
}

/// One timestamped sensor reading. The value is nullable upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub date: DateTime<Utc>,
    pub value: Option<f64>,
}

/// The canonical persisted time-series record: one station's index levels and
/// latest pollutant values at one sync instant.
///
/// Append-only. `id` is assigned by the store at save time. Every index and
/// pollutant field is independently optional; a record with all of them
/// empty is still valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Option<i32>,
    pub station_id: i32,
    pub station_name: String,
    pub measurement_date: DateTime<Utc>,

    // Index data
    pub overall_index_level: Option<AirQualityLevel>,
    pub so2_index_level: Option<AirQualityLevel>,
    pub no2_index_level: Option<AirQualityLevel>,
    pub pm10_index_level: Option<AirQualityLevel>,
    /// Present in the schema for completeness; upstream publishes no PM2.5
    /// index category, so normalization never populates it.
    pub pm25_index_level: Option<AirQualityLevel>,

    // Sensor readings
    pub pm10_value: Option<f64>,
    pub pm25_value: Option<f64>,
    pub so2_value: Option<f64>,
    pub no2_value: Option<f64>,
    pub co_value: Option<f64>,
    pub o3_value: Option<f64>,

    pub created_at: DateTime<Utc>,
}

impl Measurement {
    /// Builds a measurement from a live index and the per-pollutant latest
    /// values extracted by the sync pass. `created_at` is stamped from the
    /// system clock in UTC.
    pub fn from_index(
        station_id: i32,
        station_name: &str,
        index: &AirQualityIndex,
        sensor_values: &HashMap<String, f64>,
    ) -> Self {
        Self {
            id: None,
            station_id,
            station_name: station_name.to_string(),
            measurement_date: index.calculation_date,
            overall_index_level: AirQualityLevel::from_label(&index.overall_level),
            so2_index_level: AirQualityLevel::from_label(&index.so2_level),
            no2_index_level: AirQualityLevel::from_label(&index.no2_level),
            pm10_index_level: AirQualityLevel::from_label(&index.pm10_level),
            pm25_index_level: None,
            pm10_value: sensor_values.get("PM10").copied(),
            pm25_value: sensor_values.get("PM2.5").copied(),
            so2_value: sensor_values.get("SO2").copied(),
            no2_value: sensor_values.get("NO2").copied(),
            co_value: sensor_values.get("CO").copied(),
            o3_value: sensor_values.get("O3").copied(),
            created_at: Utc::now(),
        }
    }

    pub fn has_good_air_quality(&self) -> bool {
        self.overall_index_level.map(|l| l.is_good()).unwrap_or(false)
    }
}

/// Aggregated statistics for one station over a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub station_id: i32,
    pub station_name: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub measurement_count: usize,

    // PM10 statistics
    pub pm10_avg: Option<f64>,
    pub pm10_min: Option<f64>,
    pub pm10_max: Option<f64>,

    // PM2.5 statistics
    pub pm25_avg: Option<f64>,
    pub pm25_min: Option<f64>,
    pub pm25_max: Option<f64>,

    // Other pollutants
    pub so2_avg: Option<f64>,
    pub no2_avg: Option<f64>,
    pub co_avg: Option<f64>,
    pub o3_avg: Option<f64>,

    /// Histogram of overall index levels over the period, indexed by
    /// severity (position 0 counts VERY_GOOD). Records with no overall
    /// level are not counted.
    pub level_counts: [u32; 6],
}

impl Statistics {
    /// The most frequent overall level in the period. Ties are broken by
    /// declaration order, so VERY_GOOD beats GOOD beats MODERATE and so on
    /// when counts are equal.
    pub fn most_common_level(&self) -> AirQualityLevel {
        let mut best = AirQualityLevel::VeryGood;
        let mut best_count = self.level_counts[0];
        for level in AirQualityLevel::ALL {
            let count = self.level_counts[level.severity() as usize];
            if count > best_count {
                best = level;
                best_count = count;
            }
        }
        best
    }

    pub fn count_for(&self, level: AirQualityLevel) -> u32 {
        self.level_counts[level.severity() as usize]
    }
}

/// One entry of the best-to-worst station ranking for a time window.
///
/// The embedded station carries only the id and denormalized name; ranking
/// does not re-fetch full station metadata, so the geographic fields are
/// defaulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRanking {
    /// 1-based dense rank: entries with equal sort keys share a rank.
    pub rank: u32,
    pub station: Station,
    /// Composite score, average of the PM10 and PM2.5 window averages
    /// (whichever are present). Lower is better. `None` when the station
    /// has no PM data at all in the window.
    pub average_score: Option<f64>,
    pub dominant_level: Option<AirQualityLevel>,
    pub measurement_count: usize,
}

impl StationRanking {
    pub fn has_good_air_quality(&self) -> bool {
        self.dominant_level.map(|l| l.is_good()).unwrap_or(false)
    }
}

/// A station paired with its distance from a query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationDistance {
    pub station: Station,
    pub distance_km: f64,
}

impl StationDistance {
    /// Construction rejects negative distances.
    pub fn new(station: Station, distance_km: f64) -> Result<Self> {
        if distance_km < 0.0 {
            return Err(AppError::InvalidInput(
                "distance cannot be negative".to_string(),
            ));
        }
        Ok(Self {
            station,
            distance_km,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_station() -> Station {
        Station {
            id: 123,
            name: "Station 1".to_string(),
            city: "Warsaw".to_string(),
            address: Some("Street 1".to_string()),
            latitude: 52.2297,
            longitude: 21.0122,
        }
    }

    fn test_index(station_id: i32) -> AirQualityIndex {
        AirQualityIndex {
            station_id,
            calculation_date: Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
            overall_level: "Dobry".to_string(),
            so2_level: "Bardzo dobry".to_string(),
            no2_level: "Umiarkowany".to_string(),
            pm10_level: "Brak danych".to_string(),
        }
    }

    #[test]
    fn parses_all_polish_labels() {
        assert_eq!(
            AirQualityLevel::from_label("Bardzo dobry"),
            Some(AirQualityLevel::VeryGood)
        );
        assert_eq!(
            AirQualityLevel::from_label("Dobry"),
            Some(AirQualityLevel::Good)
        );
        assert_eq!(
            AirQualityLevel::from_label("Umiarkowany"),
            Some(AirQualityLevel::Moderate)
        );
        assert_eq!(
            AirQualityLevel::from_label("Dostateczny"),
            Some(AirQualityLevel::Sufficient)
        );
        assert_eq!(
            AirQualityLevel::from_label("Zły"),
            Some(AirQualityLevel::Bad)
        );
        assert_eq!(
            AirQualityLevel::from_label("Bardzo zły"),
            Some(AirQualityLevel::VeryBad)
        );
    }

    #[test]
    fn label_parsing_is_case_insensitive_and_trimmed() {
        assert_eq!(
            AirQualityLevel::from_label("  BARDZO DOBRY "),
            Some(AirQualityLevel::VeryGood)
        );
        assert_eq!(
            AirQualityLevel::from_label("dobry"),
            Some(AirQualityLevel::Good)
        );
    }

    #[test]
    fn unknown_label_is_absent_not_an_error() {
        assert_eq!(AirQualityLevel::from_label("Brak danych"), None);
        assert_eq!(AirQualityLevel::from_label(""), None);
        assert_eq!(AirQualityLevel::from_label("excellent"), None);
    }

    #[test]
    fn level_name_round_trip() {
        for level in AirQualityLevel::ALL {
            assert_eq!(AirQualityLevel::from_name(level.as_str()), Some(level));
        }
        assert_eq!(AirQualityLevel::from_name("UNHEARD_OF"), None);
    }

    #[test]
    fn severity_orders_levels() {
        assert!(AirQualityLevel::VeryGood.is_better_than(AirQualityLevel::Good));
        assert!(AirQualityLevel::VeryBad.is_worse_than(AirQualityLevel::Bad));
        assert!(!AirQualityLevel::Moderate.is_better_than(AirQualityLevel::Moderate));
        assert!(AirQualityLevel::VeryGood < AirQualityLevel::VeryBad);
        assert_eq!(AirQualityLevel::Sufficient.severity(), 3);
    }

    #[test]
    fn measurement_from_index_maps_levels_and_values() {
        let index = test_index(123);
        let mut values = HashMap::new();
        values.insert("PM10".to_string(), 25.5);
        values.insert("PM2.5".to_string(), 14.0);
        values.insert("O3".to_string(), 60.2);

        let m = Measurement::from_index(123, "Station 1", &index, &values);

        assert_eq!(m.id, None);
        assert_eq!(m.station_id, 123);
        assert_eq!(m.station_name, "Station 1");
        assert_eq!(m.measurement_date, index.calculation_date);
        assert_eq!(m.overall_index_level, Some(AirQualityLevel::Good));
        assert_eq!(m.so2_index_level, Some(AirQualityLevel::VeryGood));
        assert_eq!(m.no2_index_level, Some(AirQualityLevel::Moderate));
        // "Brak danych" is the upstream no-data marker, not a level
        assert_eq!(m.pm10_index_level, None);
        assert_eq!(m.pm25_index_level, None);
        assert_eq!(m.pm10_value, Some(25.5));
        assert_eq!(m.pm25_value, Some(14.0));
        assert_eq!(m.o3_value, Some(60.2));
        assert_eq!(m.so2_value, None);
        assert_eq!(m.no2_value, None);
        assert_eq!(m.co_value, None);
    }

    #[test]
    fn measurement_with_no_values_is_still_valid() {
        let index = AirQualityIndex {
            station_id: 7,
            calculation_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            overall_level: "Brak danych".to_string(),
            so2_level: "Brak danych".to_string(),
            no2_level: "Brak danych".to_string(),
            pm10_level: "Brak danych".to_string(),
        };
        let m = Measurement::from_index(7, "Empty", &index, &HashMap::new());
        assert_eq!(m.overall_index_level, None);
        assert_eq!(m.pm10_value, None);
        assert!(!m.has_good_air_quality());
    }

    #[test]
    fn most_common_level_breaks_ties_by_declaration_order() {
        let stats = Statistics {
            station_id: 1,
            station_name: "S".to_string(),
            period_start: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            period_end: Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap(),
            measurement_count: 6,
            pm10_avg: None,
            pm10_min: None,
            pm10_max: None,
            pm25_avg: None,
            pm25_min: None,
            pm25_max: None,
            so2_avg: None,
            no2_avg: None,
            co_avg: None,
            o3_avg: None,
            level_counts: [2, 2, 1, 1, 0, 0],
        };
        // VERY_GOOD and GOOD tie at 2; declaration order wins
        assert_eq!(stats.most_common_level(), AirQualityLevel::VeryGood);

        let worse = Statistics {
            level_counts: [0, 1, 3, 0, 3, 0],
            ..stats
        };
        // MODERATE and BAD tie at 3; MODERATE declared first
        assert_eq!(worse.most_common_level(), AirQualityLevel::Moderate);
    }

    #[test]
    fn station_distance_rejects_negative() {
        assert!(StationDistance::new(test_station(), -0.001).is_err());
        let ok = StationDistance::new(test_station(), 0.0).unwrap();
        assert_eq!(ok.distance_km, 0.0);
    }
}
