//! Pure aggregation over fetched measurement rows.
//!
//! Statistics and ranking semantics live here, in plain functions, so the
//! Postgres store and any in-memory store compute identical results and the
//! missing-data and tie-break policies stay unit-testable.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{AirQualityLevel, Measurement, Station, StationRanking, Statistics};

/// Average, minimum and maximum over the non-null samples of one pollutant.
/// Absent when there are zero samples.
fn summarize<I>(values: I) -> Option<(f64, f64, f64)>
where
    I: Iterator<Item = f64>,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    if count == 0 {
        None
    } else {
        Some((sum / count as f64, min, max))
    }
}

/// Plain average over non-null samples. Presence is decided by the sample
/// count, so a genuine all-zero series reports `Some(0.0)`.
fn average<I>(values: I) -> Option<f64>
where
    I: Iterator<Item = f64>,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    for v in values {
        count += 1;
        sum += v;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Computes statistics for one station's records within a period.
/// Returns `None` when the period holds no records at all.
pub fn compute_statistics(
    station_id: i32,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    measurements: &[Measurement],
) -> Option<Statistics> {
    let first = measurements.first()?;

    let pm10 = summarize(measurements.iter().filter_map(|m| m.pm10_value));
    let pm25 = summarize(measurements.iter().filter_map(|m| m.pm25_value));

    let mut level_counts = [0u32; 6];
    for level in measurements.iter().filter_map(|m| m.overall_index_level) {
        level_counts[level.severity() as usize] += 1;
    }

    Some(Statistics {
        station_id,
        station_name: first.station_name.clone(),
        period_start: from,
        period_end: to,
        measurement_count: measurements.len(),
        pm10_avg: pm10.map(|(avg, _, _)| avg),
        pm10_min: pm10.map(|(_, min, _)| min),
        pm10_max: pm10.map(|(_, _, max)| max),
        pm25_avg: pm25.map(|(avg, _, _)| avg),
        pm25_min: pm25.map(|(_, min, _)| min),
        pm25_max: pm25.map(|(_, _, max)| max),
        so2_avg: average(measurements.iter().filter_map(|m| m.so2_value)),
        no2_avg: average(measurements.iter().filter_map(|m| m.no2_value)),
        co_avg: average(measurements.iter().filter_map(|m| m.co_value)),
        o3_avg: average(measurements.iter().filter_map(|m| m.o3_value)),
        level_counts,
    })
}

struct StationGroup {
    station_id: i32,
    station_name: String,
    pm10_sum: f64,
    pm10_count: usize,
    pm25_sum: f64,
    pm25_count: usize,
    dominant_level: Option<AirQualityLevel>,
    measurement_count: usize,
}

struct RankedEntry {
    group: StationGroup,
    pm10_avg: Option<f64>,
    pm25_avg: Option<f64>,
    score: Option<f64>,
}

/// Orders optional sort keys ascending with absent keys after every present
/// one, so stations without PM data rank behind all scored stations.
fn cmp_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Groups window records by station and produces the best-to-worst ranking.
///
/// Per group: the station name comes from the first record, the dominant
/// level is the first non-null overall level in window order, and the
/// composite score averages whichever of the PM10/PM2.5 window averages are
/// present. Entries sort ascending on (pm10 avg, pm25 avg), carry a 1-based
/// dense rank (equal sort keys share a rank), and the list is truncated to
/// `limit` entries.
pub fn compute_ranking(measurements: &[Measurement], limit: usize) -> Vec<StationRanking> {
    // Group in first-encounter order so the stable sort keeps a
    // deterministic order for tied entries.
    let mut groups: Vec<StationGroup> = Vec::new();
    let mut index_by_station: HashMap<i32, usize> = HashMap::new();

    for m in measurements {
        let idx = *index_by_station.entry(m.station_id).or_insert_with(|| {
            groups.push(StationGroup {
                station_id: m.station_id,
                station_name: m.station_name.clone(),
                pm10_sum: 0.0,
                pm10_count: 0,
                pm25_sum: 0.0,
                pm25_count: 0,
                dominant_level: None,
                measurement_count: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[idx];
        group.measurement_count += 1;
        if let Some(v) = m.pm10_value {
            group.pm10_sum += v;
            group.pm10_count += 1;
        }
        if let Some(v) = m.pm25_value {
            group.pm25_sum += v;
            group.pm25_count += 1;
        }
        if group.dominant_level.is_none() {
            group.dominant_level = m.overall_index_level;
        }
    }

    let mut entries: Vec<RankedEntry> = groups
        .into_iter()
        .map(|group| {
            let pm10_avg = (group.pm10_count > 0).then(|| group.pm10_sum / group.pm10_count as f64);
            let pm25_avg = (group.pm25_count > 0).then(|| group.pm25_sum / group.pm25_count as f64);
            let score = match (pm10_avg, pm25_avg) {
                (Some(p10), Some(p25)) => Some((p10 + p25) / 2.0),
                (Some(p10), None) => Some(p10),
                (None, Some(p25)) => Some(p25),
                (None, None) => None,
            };
            RankedEntry {
                group,
                pm10_avg,
                pm25_avg,
                score,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        cmp_optional(a.pm10_avg, b.pm10_avg).then(cmp_optional(a.pm25_avg, b.pm25_avg))
    });

    let mut rankings = Vec::with_capacity(entries.len().min(limit));
    let mut rank = 0u32;
    let mut previous_key: Option<(Option<f64>, Option<f64>)> = None;

    for entry in entries {
        let key = (entry.pm10_avg, entry.pm25_avg);
        if previous_key != Some(key) {
            rank += 1;
            previous_key = Some(key);
        }
        if rankings.len() >= limit {
            break;
        }
        rankings.push(StationRanking {
            rank,
            station: Station {
                id: entry.group.station_id,
                name: entry.group.station_name,
                city: String::new(),
                address: None,
                latitude: 0.0,
                longitude: 0.0,
            },
            average_score: entry.score,
            dominant_level: entry.group.dominant_level,
            measurement_count: entry.group.measurement_count,
        });
    }

    rankings
}
