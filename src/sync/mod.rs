//! Scheduled synchronization of air quality data into the historical store.
//!
//! One pass walks every known station, skips the ones with a fresh record,
//! combines the live index with the latest sensor values into a canonical
//! [`Measurement`], and finishes with retention cleanup. Failures are
//! per-station: a bad station is counted and logged, never aborts the pass,
//! and the pass itself never raises to its caller.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::AirQualityProvider;
use crate::db::HistoryRepository;
use crate::error::Result;
use crate::models::{Measurement, SensorMeasurement, Station};

/// Skip a station when it already has a record newer than this.
const FRESHNESS_WINDOW_MINUTES: i64 = 50;

/// Records older than this are removed after every pass.
const RETENTION_DAYS: i64 = 90;

/// Passes run hourly at this minute, giving the upstream system a few
/// minutes past the hour to settle.
const SCHEDULE_MINUTE: u32 = 5;

/// Outcome counts of one synchronization pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum StationOutcome {
    Saved,
    SkippedFresh,
    SkippedNoIndex,
}

/// Drives ingestion through the provider and store ports.
pub struct SyncService<P, R> {
    provider: P,
    repository: R,
    /// Serializes passes: a trigger that lands while a pass is running is
    /// skipped instead of racing the freshness gate.
    pass_guard: Mutex<()>,
}

impl<P, R> SyncService<P, R>
where
    P: AirQualityProvider,
    R: HistoryRepository,
{
    pub fn new(provider: P, repository: R) -> Self {
        Self {
            provider,
            repository,
            pass_guard: Mutex::new(()),
        }
    }

    /// Runs one full synchronization pass. Always completes, including
    /// retention cleanup, regardless of per-station failures.
    pub async fn run_pass(&self) -> SyncSummary {
        let Ok(_guard) = self.pass_guard.try_lock() else {
            warn!("Sync pass already in progress, skipping this trigger");
            return SyncSummary::default();
        };

        info!("Starting air quality data synchronization");

        let stations = self.provider.find_all_stations().await;
        info!("Found {} stations to sync", stations.len());

        let mut summary = SyncSummary::default();
        for station in &stations {
            match self.sync_station(station).await {
                Ok(StationOutcome::Saved) => summary.synced += 1,
                Ok(StationOutcome::SkippedFresh) | Ok(StationOutcome::SkippedNoIndex) => {
                    summary.skipped += 1
                },
                Err(e) => {
                    error!("Failed to sync data for station {}: {}", station.id, e);
                    summary.failed += 1;
                },
            }
        }

        info!(
            "Sync completed: {} successful, {} skipped, {} failed",
            summary.synced, summary.skipped, summary.failed
        );

        // Cleanup runs after all station work, success or failure.
        self.cleanup_old_data().await;

        summary
    }

    /// Manual trigger for admin operations; same pass, same guard.
    pub async fn trigger_manual(&self) -> SyncSummary {
        info!("Manual sync triggered");
        self.run_pass().await
    }

    async fn sync_station(&self, station: &Station) -> Result<StationOutcome> {
        let threshold = Utc::now() - Duration::minutes(FRESHNESS_WINDOW_MINUTES);
        if self
            .repository
            .has_recent_measurement(station.id, threshold)
            .await?
        {
            debug!("Skipping station {} - has recent measurement", station.id);
            return Ok(StationOutcome::SkippedFresh);
        }

        let Some(index) = self.provider.find_index_by_station_id(station.id).await else {
            debug!("No index data for station {}", station.id);
            return Ok(StationOutcome::SkippedNoIndex);
        };

        let sensor_data = self
            .provider
            .find_measurements_by_station_id(station.id)
            .await;
        let latest_values = extract_latest_sensor_values(&sensor_data);

        let measurement =
            Measurement::from_index(station.id, &station.name, &index, &latest_values);
        self.repository.save(measurement).await?;

        debug!(
            "Saved measurement for station {}: {}",
            station.name, index.overall_level
        );
        Ok(StationOutcome::Saved)
    }

    /// Remove measurements older than the retention threshold. Its own
    /// failures are logged and swallowed so the pass still completes.
    async fn cleanup_old_data(&self) {
        let threshold = Utc::now() - Duration::days(RETENTION_DAYS);
        match self.repository.delete_older_than(threshold).await {
            Ok(()) => info!("Cleaned up measurements older than {}", threshold),
            Err(e) => error!("Error cleaning up old measurements: {}", e),
        }
    }

    /// Runs passes forever on the hourly schedule. Intended for the `serve`
    /// command; never returns.
    pub async fn run_scheduler(&self) {
        loop {
            let next = next_run_after(Utc::now());
            info!("Next sync pass scheduled at {}", next);
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            self.run_pass().await;
        }
    }
}

/// Picks the latest value per pollutant code: the first non-null reading in
/// each sensor's series, relying on the upstream most-recent-first order.
/// Readings are not re-sorted by timestamp; if upstream ever breaks that
/// order the picked value may not be the newest.
fn extract_latest_sensor_values(measurements: &[SensorMeasurement]) -> HashMap<String, f64> {
    let mut values = HashMap::new();
    for sensor in measurements {
        if let Some(latest) = sensor.readings.iter().find_map(|r| r.value) {
            values.insert(sensor.param_code.clone(), latest);
        }
    }
    values
}

/// The next run time strictly after `now`: minute 5 of the current hour if
/// still ahead, otherwise minute 5 of the next hour.
pub fn next_run_after(now: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = now
        .with_minute(SCHEDULE_MINUTE)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0));
    match candidate {
        Some(candidate) if candidate > now => candidate,
        Some(candidate) => candidate + Duration::hours(1),
        None => now + Duration::hours(1),
    }
}
