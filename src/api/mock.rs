//! Provides a mock data provider for generating plausible air quality data.
//!
//! This is used for offline operation (`--mock`) and demos where consistent,
//! controllable data is needed without hitting the actual GIOS API. Station
//! identities are fixed; index levels and reading values are randomized
//! within typical ranges.

use chrono::{Duration, Utc};
use rand::{thread_rng, Rng};
use tracing::debug;

use crate::models::{AirQualityIndex, Reading, SensorMeasurement, Station};

use super::provider::AirQualityProvider;

const LEVEL_LABELS: [&str; 6] = [
    "Bardzo dobry",
    "Dobry",
    "Umiarkowany",
    "Dostateczny",
    "Zły",
    "Bardzo zły",
];

/// Pollutant codes with plausible value ranges (µg/m³, CO in mg/m³).
const POLLUTANTS: [(&str, &str, f64, f64); 6] = [
    ("PM10", "Pył zawieszony PM10", 5.0, 80.0),
    ("PM2.5", "Pył zawieszony PM2.5", 3.0, 60.0),
    ("SO2", "Dwutlenek siarki", 1.0, 30.0),
    ("NO2", "Dwutlenek azotu", 5.0, 60.0),
    ("CO", "Tlenek węgla", 0.1, 1.5),
    ("O3", "Ozon", 20.0, 120.0),
];

/// Generates mock GIOS-shaped data for a small fixed network of stations.
pub struct MockDataProvider {
    stations: Vec<Station>,
}

impl MockDataProvider {
    pub fn new() -> Self {
        debug!("Creating MockDataProvider");
        Self {
            stations: vec![
                mock_station(101, "Warszawa-Marszałkowska", "Warszawa", 52.2297, 21.0122),
                mock_station(102, "Kraków-Krasińskiego", "Kraków", 50.0647, 19.9450),
                mock_station(103, "Gdańsk-Wrzeszcz", "Gdańsk", 54.3800, 18.6200),
                mock_station(104, "Wrocław-Korzeniowskiego", "Wrocław", 51.1079, 17.0385),
                mock_station(105, "Poznań-Polanka", "Poznań", 52.4064, 16.9252),
            ],
        }
    }
}

impl Default for MockDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn mock_station(id: i32, name: &str, city: &str, latitude: f64, longitude: f64) -> Station {
    Station {
        id,
        name: name.to_string(),
        city: city.to_string(),
        address: None,
        latitude,
        longitude,
    }
}

impl AirQualityProvider for MockDataProvider {
    async fn find_all_stations(&self) -> Vec<Station> {
        self.stations.clone()
    }

    async fn find_index_by_station_id(&self, station_id: i32) -> Option<AirQualityIndex> {
        if !self.stations.iter().any(|s| s.id == station_id) {
            debug!("Mock index requested for unknown station {}", station_id);
            return None;
        }
        let mut rng = thread_rng();
        let pick = |rng: &mut rand::rngs::ThreadRng| {
            LEVEL_LABELS[rng.gen_range(0..LEVEL_LABELS.len())].to_string()
        };
        Some(AirQualityIndex {
            station_id,
            calculation_date: Utc::now(),
            overall_level: pick(&mut rng),
            so2_level: pick(&mut rng),
            no2_level: pick(&mut rng),
            pm10_level: pick(&mut rng),
        })
    }

    async fn find_measurements_by_station_id(&self, station_id: i32) -> Vec<SensorMeasurement> {
        if !self.stations.iter().any(|s| s.id == station_id) {
            return Vec::new();
        }
        let mut rng = thread_rng();
        let now = Utc::now();

        POLLUTANTS
            .iter()
            .enumerate()
            .map(|(i, (code, name, min, max))| {
                // 24 hourly readings, newest first, with the occasional gap
                // the way the real network produces them.
                let readings = (0..24)
                    .map(|hour| Reading {
                        date: now - Duration::hours(hour),
                        value: if hour % 7 == 5 {
                            None
                        } else {
                            Some(rng.gen_range(*min..*max))
                        },
                    })
                    .collect();
                SensorMeasurement {
                    sensor_id: station_id * 10 + i as i32,
                    param_code: code.to_string(),
                    param_name: name.to_string(),
                    readings,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_serves_fixed_stations() {
        let provider = MockDataProvider::new();
        let stations = provider.find_all_stations().await;
        assert_eq!(stations.len(), 5);
        assert!(stations.iter().any(|s| s.city == "Warszawa"));
    }

    #[tokio::test]
    async fn mock_index_is_absent_for_unknown_station() {
        let provider = MockDataProvider::new();
        assert!(provider.find_index_by_station_id(999).await.is_none());
        let index = provider.find_index_by_station_id(101).await.unwrap();
        assert_eq!(index.station_id, 101);
        assert!(LEVEL_LABELS.contains(&index.overall_level.as_str()));
    }

    #[tokio::test]
    async fn mock_measurements_cover_all_pollutants() {
        let provider = MockDataProvider::new();
        let measurements = provider.find_measurements_by_station_id(102).await;
        assert_eq!(measurements.len(), 6);
        for m in &measurements {
            assert_eq!(m.readings.len(), 24);
            assert!(m.readings.iter().any(|r| r.value.is_some()));
        }
    }
}
