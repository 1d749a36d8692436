//! The port for durable persistence and querying of canonical measurements.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Measurement, StationRanking, Statistics};

/// Operations a historical store must support. The orchestrator writes
/// through this trait; the query service reads through it.
#[allow(async_fn_in_trait)]
pub trait HistoryRepository {
    /// Append-only save; returns the measurement with its assigned identity.
    async fn save(&self, measurement: Measurement) -> Result<Measurement>;

    /// Batch variant of [`save`](Self::save).
    async fn save_all(&self, measurements: Vec<Measurement>) -> Result<Vec<Measurement>>;

    /// The most recent measurement for a station, or absent.
    async fn find_latest_by_station_id(&self, station_id: i32) -> Result<Option<Measurement>>;

    /// Station-scoped inclusive range query, ordered by timestamp ascending.
    async fn find_by_station_id_and_date_range(
        &self,
        station_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Measurement>>;

    /// Global inclusive range query, ordered by timestamp descending.
    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Measurement>>;

    /// Whether any record for the station is timestamped at or after the
    /// threshold. Used by the sync pass as its freshness gate.
    async fn has_recent_measurement(
        &self,
        station_id: i32,
        threshold: DateTime<Utc>,
    ) -> Result<bool>;

    /// Bulk delete of records strictly older than the threshold.
    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<()>;

    /// Aggregated statistics for a station over a period; absent when the
    /// period holds no records.
    async fn calculate_statistics(
        &self,
        station_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Statistics>>;

    /// Best-to-worst station ranking over a window, truncated to `limit`.
    async fn get_ranking(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StationRanking>>;

    /// Bounding-box query over station coordinates and date range.
    ///
    /// Not implemented yet: measurements do not carry coordinates, so this
    /// returns empty until a geospatial index lands.
    async fn find_by_geo_bounds(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Measurement>>;
}
