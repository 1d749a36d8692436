//! Provides PostgreSQL database interaction functionalities using `sqlx`.
//!
//! Includes capabilities for establishing connection pools, initializing the
//! database schema, inserting canonical measurements, and serving the range
//! queries that feed the aggregation engine.
//! Also contains integration tests for database operations (requires the
//! `integration-tests` feature).

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use tracing::{debug, error, info, warn};

use crate::db::aggregate;
use crate::db::repository::HistoryRepository;
use crate::error::{AppError, Result};
use crate::models::{Measurement, MeasurementRecord, StationRanking, Statistics};

/// Represents the database connection pool and provides methods for
/// database operations.
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    /// Creates a new `Database` instance by establishing a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the connection pool cannot be established.
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                AppError::Db(e.into())
            })?;

        info!("Connected to database successfully");
        Ok(Self { pool })
    }

    /// Initializes the database schema by creating the `measurements` table
    /// and necessary indexes.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` and `CREATE INDEX IF NOT EXISTS` so
    /// it can be safely run multiple times.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any SQL query fails during schema creation.
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema (if necessary)...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS measurements (
                id SERIAL PRIMARY KEY,
                station_id INTEGER NOT NULL,
                station_name TEXT NOT NULL,
                measurement_date TIMESTAMPTZ NOT NULL,
                overall_index_level TEXT,
                so2_index_level TEXT,
                no2_index_level TEXT,
                pm10_index_level TEXT,
                pm25_index_level TEXT,
                pm10_value NUMERIC,
                pm25_value NUMERIC,
                so2_value NUMERIC,
                no2_value NUMERIC,
                co_value NUMERIC,
                o3_value NUMERIC,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create measurements table: {}", e);
            AppError::Db(e.into())
        })?;

        // Index on station_id for the per-station queries and the
        // freshness gate.
        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_measurements_station_id ON measurements(station_id)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create station index: {}", e);
            AppError::Db(e.into())
        })?;

        // Index on measurement_date for range queries and retention cleanup.
        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_measurements_measurement_date ON measurements(measurement_date)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create date index: {}", e);
            AppError::Db(e.into())
        })?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    async fn insert_record(&self, record: &MeasurementRecord) -> Result<i32> {
        let row = sqlx::query(
            r#"
            INSERT INTO measurements
            (station_id, station_name, measurement_date,
             overall_index_level, so2_index_level, no2_index_level,
             pm10_index_level, pm25_index_level,
             pm10_value, pm25_value, so2_value, no2_value, co_value, o3_value,
             created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
        )
        .bind(record.station_id)
        .bind(&record.station_name)
        .bind(record.measurement_date)
        .bind(&record.overall_index_level)
        .bind(&record.so2_index_level)
        .bind(&record.no2_index_level)
        .bind(&record.pm10_index_level)
        .bind(&record.pm25_index_level)
        .bind(record.pm10_value)
        .bind(record.pm25_value)
        .bind(record.so2_value)
        .bind(record.no2_value)
        .bind(record.co_value)
        .bind(record.o3_value)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to insert measurement record: {}", e);
            AppError::Db(e.into())
        })?;

        row.try_get::<i32, _>(0).map_err(|e| {
            error!("Failed to read assigned measurement id: {}", e);
            AppError::Db(e.into())
        })
    }

    async fn fetch_range(
        &self,
        station_id: Option<i32>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        ascending: bool,
    ) -> Result<Vec<Measurement>> {
        let order = if ascending { "ASC" } else { "DESC" };
        let result = if let Some(station_id) = station_id {
            sqlx::query_as::<_, MeasurementRecord>(&format!(
                r#"
                SELECT * FROM measurements
                WHERE station_id = $1 AND measurement_date BETWEEN $2 AND $3
                ORDER BY measurement_date {}
                "#,
                order
            ))
            .bind(station_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, MeasurementRecord>(&format!(
                r#"
                SELECT * FROM measurements
                WHERE measurement_date BETWEEN $1 AND $2
                ORDER BY measurement_date {}
                "#,
                order
            ))
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
        };
        let records: Vec<MeasurementRecord> = result.map_err(|e| {
            error!("Failed to query measurements in range: {}", e);
            AppError::Db(e.into())
        })?;

        Ok(records.into_iter().map(MeasurementRecord::into_domain).collect())
    }
}

impl HistoryRepository for Database {
    async fn save(&self, measurement: Measurement) -> Result<Measurement> {
        debug!(
            "Saving measurement for station {}",
            measurement.station_id
        );
        let record = MeasurementRecord::from_domain(&measurement);
        let id = self.insert_record(&record).await?;
        Ok(Measurement {
            id: Some(id),
            ..measurement
        })
    }

    async fn save_all(&self, measurements: Vec<Measurement>) -> Result<Vec<Measurement>> {
        if measurements.is_empty() {
            debug!("No measurements provided for insertion.");
            return Ok(Vec::new());
        }

        info!(
            "Preparing to insert {} measurements into database...",
            measurements.len()
        );

        // Convert to row format in parallel for larger batches.
        let records: Vec<MeasurementRecord> = measurements
            .par_iter()
            .map(MeasurementRecord::from_domain)
            .collect();

        // Use a transaction to ensure all measurements are inserted or none are.
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin database transaction: {}", e);
            AppError::Db(e.into())
        })?;

        let mut saved = Vec::with_capacity(measurements.len());
        for (measurement, record) in measurements.into_iter().zip(records.iter()) {
            let row = sqlx::query(
                r#"
                INSERT INTO measurements
                (station_id, station_name, measurement_date,
                 overall_index_level, so2_index_level, no2_index_level,
                 pm10_index_level, pm25_index_level,
                 pm10_value, pm25_value, so2_value, no2_value, co_value, o3_value,
                 created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                RETURNING id
                "#,
            )
            .bind(record.station_id)
            .bind(&record.station_name)
            .bind(record.measurement_date)
            .bind(&record.overall_index_level)
            .bind(&record.so2_index_level)
            .bind(&record.no2_index_level)
            .bind(&record.pm10_index_level)
            .bind(&record.pm25_index_level)
            .bind(record.pm10_value)
            .bind(record.pm25_value)
            .bind(record.so2_value)
            .bind(record.no2_value)
            .bind(record.co_value)
            .bind(record.o3_value)
            .bind(record.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to insert measurement record: {}", e);
                AppError::Db(e.into())
            })?;

            let id: i32 = row.try_get(0).map_err(|e| {
                error!("Failed to read assigned measurement id: {}", e);
                AppError::Db(e.into())
            })?;
            saved.push(Measurement {
                id: Some(id),
                ..measurement
            });
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit database transaction: {}", e);
            AppError::Db(e.into())
        })?;

        info!("Successfully inserted {} measurements", saved.len());
        Ok(saved)
    }

    async fn find_latest_by_station_id(&self, station_id: i32) -> Result<Option<Measurement>> {
        let record = sqlx::query_as::<_, MeasurementRecord>(
            r#"
            SELECT * FROM measurements
            WHERE station_id = $1
            ORDER BY measurement_date DESC
            LIMIT 1
            "#,
        )
        .bind(station_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to query latest measurement for station {}: {}",
                station_id, e
            );
            AppError::Db(e.into())
        })?;

        Ok(record.map(MeasurementRecord::into_domain))
    }

    async fn find_by_station_id_and_date_range(
        &self,
        station_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Measurement>> {
        self.fetch_range(Some(station_id), from, to, true).await
    }

    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Measurement>> {
        self.fetch_range(None, from, to, false).await
    }

    async fn has_recent_measurement(
        &self,
        station_id: i32,
        threshold: DateTime<Utc>,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM measurements
                WHERE station_id = $1 AND measurement_date >= $2
            )
            "#,
        )
        .bind(station_id)
        .bind(threshold)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to check recent measurement for station {}: {}",
                station_id, e
            );
            AppError::Db(e.into())
        })?;

        Ok(exists)
    }

    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<()> {
        info!("Deleting measurements older than {}", threshold);
        let result = sqlx::query(r#"DELETE FROM measurements WHERE measurement_date < $1"#)
            .bind(threshold)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to delete old measurements: {}", e);
                AppError::Db(e.into())
            })?;

        debug!("Deleted {} old measurements", result.rows_affected());
        Ok(())
    }

    async fn calculate_statistics(
        &self,
        station_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Statistics>> {
        let measurements = self
            .find_by_station_id_and_date_range(station_id, from, to)
            .await?;
        Ok(aggregate::compute_statistics(
            station_id,
            from,
            to,
            &measurements,
        ))
    }

    async fn get_ranking(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StationRanking>> {
        // Window order matters for the dominant-level pick, so fetch
        // chronologically ascending.
        let measurements = self.fetch_range(None, from, to, true).await?;
        Ok(aggregate::compute_ranking(&measurements, limit))
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
        // Measurements do not carry coordinates yet; this needs stations
        // embedded in measurements or a join against a station table.
        warn!("find_by_geo_bounds not yet implemented");
        Ok(Vec::new())
    }
}
