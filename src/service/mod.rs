//! Read-path façade over the provider and the historical store.
//!
//! Validates and clamps caller-supplied parameters before delegating: live
//! reads go to the provider, historical reads and aggregates to the store.
//! Lookups that find nothing surface [`AppError::NotFound`], never a
//! default value.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::api::AirQualityProvider;
use crate::db::HistoryRepository;
use crate::error::{AppError, Result};
use crate::models::{
    AirQualityIndex, Measurement, SensorMeasurement, Station, StationDistance, StationRanking,
    Statistics,
};

const EARTH_RADIUS_KM: f64 = 6371.0;

const MIN_DAYS: i64 = 1;
const MAX_DAYS: i64 = 90;
const MIN_LIMIT: i64 = 5;
const MAX_LIMIT: i64 = 50;
const MIN_RADIUS_KM: f64 = 1.0;
const MAX_RADIUS_KM: f64 = 100.0;

/// Clamps a look-back window to [1, 90] days.
pub fn clamp_days(days: i64) -> i64 {
    days.clamp(MIN_DAYS, MAX_DAYS)
}

/// Clamps a ranking size to [5, 50] entries.
pub fn clamp_limit(limit: i64) -> usize {
    limit.clamp(MIN_LIMIT, MAX_LIMIT) as usize
}

/// Clamps a search radius to [1, 100] kilometers.
pub fn clamp_radius(radius_km: f64) -> f64 {
    radius_km.clamp(MIN_RADIUS_KM, MAX_RADIUS_KM)
}

/// Great-circle distance between two coordinates via the haversine formula.
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// The query-side service consumed by thin API layers.
pub struct AirQualityService<P, R> {
    provider: P,
    repository: R,
}

impl<P, R> AirQualityService<P, R>
where
    P: AirQualityProvider,
    R: HistoryRepository,
{
    pub fn new(provider: P, repository: R) -> Self {
        Self {
            provider,
            repository,
        }
    }

    /// List of all air quality stations (live).
    pub async fn get_all_stations(&self) -> Vec<Station> {
        self.provider.find_all_stations().await
    }

    /// Current air quality index for a station (live).
    pub async fn get_index_for_station(&self, station_id: i32) -> Result<AirQualityIndex> {
        self.provider
            .find_index_by_station_id(station_id)
            .await
            .ok_or_else(|| {
                AppError::NotFound(format!("no air quality index for station {}", station_id))
            })
    }

    /// Current sensor measurements for a station (live).
    pub async fn get_measurements_for_station(
        &self,
        station_id: i32,
    ) -> Result<Vec<SensorMeasurement>> {
        let measurements = self
            .provider
            .find_measurements_by_station_id(station_id)
            .await;
        if measurements.is_empty() {
            return Err(AppError::NotFound(format!(
                "no sensor measurements for station {}",
                station_id
            )));
        }
        Ok(measurements)
    }

    /// Latest persisted measurement for a station.
    pub async fn get_latest_measurement(&self, station_id: i32) -> Result<Measurement> {
        self.repository
            .find_latest_by_station_id(station_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no stored measurement for station {}", station_id))
            })
    }

    /// Historical measurements for a station; `days_back` is clamped to
    /// [1, 90].
    pub async fn get_historical_measurements(
        &self,
        station_id: i32,
        days_back: i64,
    ) -> Result<Vec<Measurement>> {
        let days = clamp_days(days_back);
        let to = Utc::now();
        let from = to - Duration::days(days);
        self.repository
            .find_by_station_id_and_date_range(station_id, from, to)
            .await
    }

    /// Measurements for all stations within an explicit time range.
    pub async fn get_measurements_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Measurement>> {
        self.repository.find_by_date_range(from, to).await
    }

    /// Statistics for a station over the clamped look-back window.
    pub async fn get_statistics(&self, station_id: i32, days_back: i64) -> Result<Statistics> {
        let days = clamp_days(days_back);
        let to = Utc::now();
        let from = to - Duration::days(days);

        self.repository
            .calculate_statistics(station_id, from, to)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no measurements for station {} in the last {} days",
                    station_id, days
                ))
            })
    }

    /// Station ranking (best to worst air quality) over the clamped window,
    /// truncated to the clamped limit.
    pub async fn get_ranking(&self, days_back: i64, limit: i64) -> Result<Vec<StationRanking>> {
        let days = clamp_days(days_back);
        let max_results = clamp_limit(limit);

        let to = Utc::now();
        let from = to - Duration::days(days);
        self.repository.get_ranking(from, to, max_results).await
    }

    /// Stations within `radius_km` (clamped to [1, 100]) of a point, sorted
    /// ascending by great-circle distance. The sort is stable: stations at
    /// equal distance keep their upstream order.
    pub async fn find_nearest_stations(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<StationDistance>> {
        let radius = clamp_radius(radius_km);

        let all_stations = self.provider.find_all_stations().await;
        let mut stations_with_distance = Vec::new();

        for station in all_stations {
            let distance =
                haversine_distance_km(latitude, longitude, station.latitude, station.longitude);
            if distance <= radius {
                stations_with_distance.push(StationDistance::new(station, distance)?);
            }
        }

        stations_with_distance.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(Ordering::Equal)
        });

        debug!(
            "Found {} stations within {}km of ({}, {})",
            stations_with_distance.len(),
            radius,
            latitude,
            longitude
        );

        Ok(stations_with_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::{Arc, Mutex as StdMutex};

    #[rstest]
    #[case(i64::MIN, 1)]
    #[case(-5, 1)]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(45, 45)]
    #[case(90, 90)]
    #[case(91, 90)]
    #[case(500, 90)]
    fn days_are_clamped_to_window(#[case] input: i64, #[case] expected: i64) {
        assert_eq!(clamp_days(input), expected);
    }

    #[rstest]
    #[case(-1, 5)]
    #[case(0, 5)]
    #[case(5, 5)]
    #[case(17, 17)]
    #[case(50, 50)]
    #[case(99, 50)]
    fn limits_are_clamped(#[case] input: i64, #[case] expected: usize) {
        assert_eq!(clamp_limit(input), expected);
    }

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(0.5, 1.0)]
    #[case(1.0, 1.0)]
    #[case(50.0, 50.0)]
    #[case(100.0, 100.0)]
    #[case(1000.0, 100.0)]
    fn radii_are_clamped(#[case] input: f64, #[case] expected: f64) {
        assert_eq!(clamp_radius(input), expected);
    }

    #[test]
    fn haversine_is_zero_at_the_same_point_and_symmetric() {
        let d0 = haversine_distance_km(52.2297, 21.0122, 52.2297, 21.0122);
        assert!(d0.abs() < 1e-9);

        let there = haversine_distance_km(52.2297, 21.0122, 50.0647, 19.9450);
        let back = haversine_distance_km(50.0647, 19.9450, 52.2297, 21.0122);
        assert!((there - back).abs() < 1e-9);
        // Warsaw to Krakow is roughly 250 km
        assert!(there > 240.0 && there < 265.0, "got {}", there);
    }

    // --- service-level tests against stub ports ---

    use crate::models::{AirQualityLevel, Reading};
    use chrono::TimeZone;

    struct StubProvider {
        stations: Vec<Station>,
        index: Option<AirQualityIndex>,
        sensors: Vec<SensorMeasurement>,
    }

    impl StubProvider {
        fn with_stations(stations: Vec<Station>) -> Self {
            Self {
                stations,
                index: None,
                sensors: Vec::new(),
            }
        }
    }

    impl AirQualityProvider for StubProvider {
        async fn find_all_stations(&self) -> Vec<Station> {
            self.stations.clone()
        }

        async fn find_index_by_station_id(&self, _station_id: i32) -> Option<AirQualityIndex> {
            self.index.clone()
        }

        async fn find_measurements_by_station_id(
            &self,
            _station_id: i32,
        ) -> Vec<SensorMeasurement> {
            self.sensors.clone()
        }
    }

    /// Store stub that records the windows and limits it is queried with.
    #[derive(Clone, Default)]
    struct RecordingRepository {
        last_range: Arc<StdMutex<Option<(DateTime<Utc>, DateTime<Utc>)>>>,
        last_limit: Arc<StdMutex<Option<usize>>>,
        latest: Option<Measurement>,
        statistics: Option<Statistics>,
    }

    impl RecordingRepository {
        fn recorded_window_days(&self) -> i64 {
            let (from, to) = self.last_range.lock().unwrap().expect("range recorded");
            (to - from).num_days()
        }
    }

    impl HistoryRepository for RecordingRepository {
        async fn save(&self, measurement: Measurement) -> Result<Measurement> {
            Ok(measurement)
        }

        async fn save_all(&self, measurements: Vec<Measurement>) -> Result<Vec<Measurement>> {
            Ok(measurements)
        }

        async fn find_latest_by_station_id(
            &self,
            _station_id: i32,
        ) -> Result<Option<Measurement>> {
            Ok(self.latest.clone())
        }

        async fn find_by_station_id_and_date_range(
            &self,
            _station_id: i32,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Measurement>> {
            *self.last_range.lock().unwrap() = Some((from, to));
            Ok(Vec::new())
        }

        async fn find_by_date_range(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Measurement>> {
            *self.last_range.lock().unwrap() = Some((from, to));
            Ok(Vec::new())
        }

        async fn has_recent_measurement(
            &self,
            _station_id: i32,
            _threshold: DateTime<Utc>,
        ) -> Result<bool> {
            Ok(false)
        }

        async fn delete_older_than(&self, _threshold: DateTime<Utc>) -> Result<()> {
            Ok(())
        }

        async fn calculate_statistics(
            &self,
            _station_id: i32,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Option<Statistics>> {
            *self.last_range.lock().unwrap() = Some((from, to));
            Ok(self.statistics.clone())
        }

        async fn get_ranking(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<StationRanking>> {
            *self.last_range.lock().unwrap() = Some((from, to));
            *self.last_limit.lock().unwrap() = Some(limit);
            Ok(Vec::new())
        }

        async fn find_by_geo_bounds(
            &self,
            _min_lat: f64,
            _max_lat: f64,
            _min_lon: f64,
            _max_lon: f64,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<Measurement>> {
            Ok(Vec::new())
        }
    }

    fn station_at(id: i32, name: &str, latitude: f64, longitude: f64) -> Station {
        Station {
            id,
            name: name.to_string(),
            city: String::new(),
            address: None,
            latitude,
            longitude,
        }
    }

    #[tokio::test]
    async fn nearest_stations_filters_sorts_and_excludes_far_ones() {
        // S1 at the query point, S2 ~1.3 km away, S3 in Krakow far
        // outside the 10 km radius.
        let provider = StubProvider::with_stations(vec![
            station_at(1, "S1", 52.2297, 21.0122),
            station_at(2, "S2", 52.2397, 21.0222),
            station_at(3, "S3", 50.0647, 19.9450),
        ]);
        let service = AirQualityService::new(provider, RecordingRepository::default());

        let result = service
            .find_nearest_stations(52.2297, 21.0122, 10.0)
            .await
            .unwrap();

        assert_eq!(result.len(), 2, "S3 is excluded");
        assert_eq!(result[0].station.id, 1);
        assert!(result[0].distance_km.abs() < 1e-9, "S1 sits on the point");
        assert_eq!(result[1].station.id, 2);
        assert!(result[1].distance_km <= 10.0);
        assert!(
            result[0].distance_km <= result[1].distance_km,
            "distances are non-decreasing"
        );
    }

    #[tokio::test]
    async fn nearest_stations_keep_upstream_order_on_equal_distance() {
        let provider = StubProvider::with_stations(vec![
            station_at(11, "First", 52.0, 21.0),
            station_at(12, "Second", 52.0, 21.0),
            station_at(13, "Third", 52.0, 21.0),
        ]);
        let service = AirQualityService::new(provider, RecordingRepository::default());

        let result = service
            .find_nearest_stations(52.0, 21.0, 5.0)
            .await
            .unwrap();

        let ids: Vec<i32> = result.iter().map(|d| d.station.id).collect();
        assert_eq!(ids, vec![11, 12, 13], "stable tie-break");
    }

    #[tokio::test]
    async fn nearest_station_radius_is_clamped_up_to_one_km() {
        // ~0.8 km away; a raw radius of 0.1 would exclude it, the clamped
        // minimum of 1 km keeps it.
        let provider = StubProvider::with_stations(vec![station_at(5, "Near", 52.2297, 21.0222)]);
        let service = AirQualityService::new(provider, RecordingRepository::default());

        let result = service
            .find_nearest_stations(52.2297, 21.0122, 0.1)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn live_index_lookup_surfaces_not_found() {
        let provider = StubProvider::with_stations(Vec::new());
        let service = AirQualityService::new(provider, RecordingRepository::default());

        let err = service.get_index_for_station(42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn live_measurement_lookup_surfaces_not_found_when_empty() {
        let provider = StubProvider::with_stations(Vec::new());
        let service = AirQualityService::new(provider, RecordingRepository::default());

        let err = service.get_measurements_for_station(42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn live_measurement_lookup_returns_series_when_present() {
        let mut provider = StubProvider::with_stations(Vec::new());
        provider.sensors = vec![SensorMeasurement {
            sensor_id: 1,
            param_code: "PM10".to_string(),
            param_name: "Pył zawieszony PM10".to_string(),
            readings: vec![Reading {
                date: Utc.with_ymd_and_hms(2026, 3, 14, 11, 0, 0).unwrap(),
                value: Some(12.0),
            }],
        }];
        let service = AirQualityService::new(provider, RecordingRepository::default());

        let series = service.get_measurements_for_station(42).await.unwrap();
        assert_eq!(series.len(), 1);
    }

    #[tokio::test]
    async fn latest_measurement_surfaces_not_found() {
        let provider = StubProvider::with_stations(Vec::new());
        let service = AirQualityService::new(provider, RecordingRepository::default());

        let err = service.get_latest_measurement(7).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn statistics_over_empty_period_surface_not_found() {
        let provider = StubProvider::with_stations(Vec::new());
        let service = AirQualityService::new(provider, RecordingRepository::default());

        let err = service.get_statistics(7, 7).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn history_window_is_clamped_to_ninety_days() {
        let provider = StubProvider::with_stations(Vec::new());
        let repo = RecordingRepository::default();
        let service = AirQualityService::new(provider, repo.clone());

        service.get_historical_measurements(1, 500).await.unwrap();
        assert_eq!(repo.recorded_window_days(), 90);

        service.get_historical_measurements(1, -3).await.unwrap();
        assert_eq!(repo.recorded_window_days(), 1);
    }

    #[tokio::test]
    async fn ranking_window_and_limit_are_clamped() {
        let provider = StubProvider::with_stations(Vec::new());
        let repo = RecordingRepository::default();
        let service = AirQualityService::new(provider, repo.clone());

        service.get_ranking(400, 400).await.unwrap();
        assert_eq!(repo.recorded_window_days(), 90);
        assert_eq!(*repo.last_limit.lock().unwrap(), Some(50));

        service.get_ranking(0, 0).await.unwrap();
        assert_eq!(repo.recorded_window_days(), 1);
        assert_eq!(*repo.last_limit.lock().unwrap(), Some(5));
    }

    #[tokio::test]
    async fn dominant_level_helpers_are_exposed_on_rankings() {
        let ranking = StationRanking {
            rank: 1,
            station: station_at(1, "S", 0.0, 0.0),
            average_score: Some(12.0),
            dominant_level: Some(AirQualityLevel::VeryGood),
            measurement_count: 10,
        };
        assert!(ranking.has_good_air_quality());
    }
}
