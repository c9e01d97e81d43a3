//! Latest-observation resolution: exactly one beacon per entity key inside a
//! time window and optional bounding box.
//!
//! Determinism contract: the winning row per key is the one with the maximum
//! timestamp among rows satisfying the filters; ties on identical timestamp
//! are broken by the lowest row id. Keys with no rows in the window are
//! simply absent from the result.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::params;

use crate::error::CoreError;
use crate::model::{AircraftBeacon, ReceiverBeacon};
use crate::store::{to_from_sql_error, SqliteBeaconStore};

/// Half-open observation window `[start, end)`. `end = None` means "up to
/// now" (no upper bound is applied in the query).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn since(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// The full beacon history.
    pub fn all() -> Self {
        Self::since(Utc.timestamp_opt(0, 0).single().unwrap_or_default())
    }
}

/// Inclusive latitude/longitude rectangle. Absence of a box means
/// unrestricted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub const WORLD: Self = Self {
        lat_min: -90.0,
        lat_max: 90.0,
        lon_min: -180.0,
        lon_max: 180.0,
    };
}

const LATEST_AIRCRAFT_SQL: &str = "
    SELECT id, address, timestamp, latitude, longitude, altitude, track,
           ground_speed, climb_rate, aircraft_type, receiver_name, device_id, receiver_id
    FROM aircraft_beacons b
    WHERE b.timestamp >= ?1
      AND (?2 IS NULL OR b.timestamp < ?2)
      AND (?3 IS NULL OR (b.latitude BETWEEN ?3 AND ?4 AND b.longitude BETWEEN ?5 AND ?6))
      AND NOT EXISTS (
          SELECT 1 FROM aircraft_beacons n
          WHERE n.address = b.address
            AND n.timestamp >= ?1
            AND (?2 IS NULL OR n.timestamp < ?2)
            AND (?3 IS NULL OR (n.latitude BETWEEN ?3 AND ?4 AND n.longitude BETWEEN ?5 AND ?6))
            AND (n.timestamp > b.timestamp OR (n.timestamp = b.timestamp AND n.id < b.id))
      )
    ORDER BY b.address ASC
";

const LATEST_RECEIVER_SQL: &str = "
    SELECT id, name, timestamp, latitude, longitude, altitude, version, platform, receiver_id
    FROM receiver_beacons b
    WHERE b.timestamp >= ?1
      AND (?2 IS NULL OR b.timestamp < ?2)
      AND (?3 IS NULL OR (b.latitude BETWEEN ?3 AND ?4 AND b.longitude BETWEEN ?5 AND ?6))
      AND NOT EXISTS (
          SELECT 1 FROM receiver_beacons n
          WHERE n.name = b.name
            AND n.timestamp >= ?1
            AND (?2 IS NULL OR n.timestamp < ?2)
            AND (?3 IS NULL OR (n.latitude BETWEEN ?3 AND ?4 AND n.longitude BETWEEN ?5 AND ?6))
            AND (n.timestamp > b.timestamp OR (n.timestamp = b.timestamp AND n.id < b.id))
      )
    ORDER BY b.name ASC
";

impl SqliteBeaconStore {
    /// The latest aircraft beacon per hardware address inside the window and
    /// optional box. Pure read; an empty result is a valid outcome.
    pub fn latest_aircraft_beacons(
        &self,
        window: &TimeWindow,
        bounding_box: Option<&BoundingBox>,
    ) -> Result<Vec<AircraftBeacon>, CoreError> {
        let start = window.start.timestamp();
        let end = window.end.map(|end| end.timestamp());
        let lat_min = bounding_box.map(|bounding_box| bounding_box.lat_min);
        let lat_max = bounding_box.map(|bounding_box| bounding_box.lat_max);
        let lon_min = bounding_box.map(|bounding_box| bounding_box.lon_min);
        let lon_max = bounding_box.map(|bounding_box| bounding_box.lon_max);

        let mut stmt = self
            .conn
            .prepare(LATEST_AIRCRAFT_SQL)
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let rows = stmt
            .query_map(params![start, end, lat_min, lat_max, lon_min, lon_max], |row| {
                Self::map_aircraft_beacon_row(row).map_err(to_from_sql_error)
            })
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    /// The latest receiver beacon per receiver name. When a box is given,
    /// only beacons that carry a position inside it are candidates.
    pub fn latest_receiver_beacons(
        &self,
        window: &TimeWindow,
        bounding_box: Option<&BoundingBox>,
    ) -> Result<Vec<ReceiverBeacon>, CoreError> {
        let start = window.start.timestamp();
        let end = window.end.map(|end| end.timestamp());
        let lat_min = bounding_box.map(|bounding_box| bounding_box.lat_min);
        let lat_max = bounding_box.map(|bounding_box| bounding_box.lat_max);
        let lon_min = bounding_box.map(|bounding_box| bounding_box.lon_min);
        let lon_max = bounding_box.map(|bounding_box| bounding_box.lon_max);

        let mut stmt = self
            .conn
            .prepare(LATEST_RECEIVER_SQL)
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let rows = stmt
            .query_map(params![start, end, lat_min, lat_max, lon_min, lon_max], |row| {
                Self::map_receiver_beacon_row(row).map_err(to_from_sql_error)
            })
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }
}
