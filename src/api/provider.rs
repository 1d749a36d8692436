//! The port through which the rest of the application reads upstream data.

use crate::models::{AirQualityIndex, SensorMeasurement, Station};

use super::{GiosClient, MockDataProvider};

/// Access to the external monitoring network.
///
/// Implementations absorb their own failures: a network or parse error
/// degrades to an empty or absent result, so none of these methods can fail.
#[allow(async_fn_in_trait)]
pub trait AirQualityProvider {
    /// All known stations, or empty when the upstream list is unavailable.
    async fn find_all_stations(&self) -> Vec<Station>;

    /// The live air quality index for a station, if one is published.
    async fn find_index_by_station_id(&self, station_id: i32) -> Option<AirQualityIndex>;

    /// All sensor reading series for a station; sensors that fail to load
    /// are dropped rather than failing the whole call.
    async fn find_measurements_by_station_id(&self, station_id: i32) -> Vec<SensorMeasurement>;
}

/// Runtime-selected provider: the real GIOS client or the offline mock.
///
/// The port uses async methods and so cannot be boxed as a trait object;
/// enum dispatch keeps the call sites generic-free.
pub enum AnyProvider {
    Gios(GiosClient),
    Mock(MockDataProvider),
}

impl AirQualityProvider for AnyProvider {
    async fn find_all_stations(&self) -> Vec<Station> {
        match self {
            AnyProvider::Gios(client) => client.find_all_stations().await,
            AnyProvider::Mock(mock) => mock.find_all_stations().await,
        }
    }

    async fn find_index_by_station_id(&self, station_id: i32) -> Option<AirQualityIndex> {
        match self {
            AnyProvider::Gios(client) => client.find_index_by_station_id(station_id).await,
            AnyProvider::Mock(mock) => mock.find_index_by_station_id(station_id).await,
        }
    }

    async fn find_measurements_by_station_id(&self, station_id: i32) -> Vec<SensorMeasurement> {
        match self {
            AnyProvider::Gios(client) => client.find_measurements_by_station_id(station_id).await,
            AnyProvider::Mock(mock) => mock.find_measurements_by_station_id(station_id).await,
        }
    }
}
