//! Reference-table reconciliation: idempotent passes that create missing
//! Device/Receiver rows from the beacon stream, re-synchronize mutable
//! receiver attributes, and backfill foreign keys on beacon rows.
//!
//! Each phase commits in its own transaction, so a crash between phases
//! leaves a valid intermediate state that the next pass completes. Insert
//! races on the unique key columns are absorbed by `ON CONFLICT DO NOTHING`
//! and reported as "already exists", never as an error.

use rusqlite::{params, OptionalExtension};

use crate::error::CoreError;
use crate::model::ReceiverBeacon;
use crate::store::{to_from_sql_error, SqliteBeaconStore};

/// Counts produced by one device reconciliation pass. A second pass over an
/// unchanged beacon stream reports zeros everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceReconcileReport {
    pub inserted_devices: usize,
    pub linked_aircraft_beacons: usize,
}

/// Counts produced by one receiver reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverReconcileReport {
    pub inserted_receivers: usize,
    pub updated_positions: usize,
    pub updated_statuses: usize,
    pub linked_receiver_beacons: usize,
    pub linked_aircraft_beacons: usize,
}

// Latest beacon per receiver that carries a complete position, and the
// latest that carries complete status, resolved with the same
// lowest-id-on-tie rule as the resolver. Both scan the full history: a
// position-less newer beacon must not shadow the last-known position.
const LATEST_POSITION_SQL: &str = "
    SELECT id, name, timestamp, latitude, longitude, altitude, version, platform, receiver_id
    FROM receiver_beacons b
    WHERE b.latitude IS NOT NULL AND b.longitude IS NOT NULL AND b.altitude IS NOT NULL
      AND NOT EXISTS (
          SELECT 1 FROM receiver_beacons n
          WHERE n.name = b.name
            AND n.latitude IS NOT NULL AND n.longitude IS NOT NULL AND n.altitude IS NOT NULL
            AND (n.timestamp > b.timestamp OR (n.timestamp = b.timestamp AND n.id < b.id))
      )
    ORDER BY b.name ASC
";

const LATEST_STATUS_SQL: &str = "
    SELECT id, name, timestamp, latitude, longitude, altitude, version, platform, receiver_id
    FROM receiver_beacons b
    WHERE b.version IS NOT NULL AND b.platform IS NOT NULL
      AND NOT EXISTS (
          SELECT 1 FROM receiver_beacons n
          WHERE n.name = b.name
            AND n.version IS NOT NULL AND n.platform IS NOT NULL
            AND (n.timestamp > b.timestamp OR (n.timestamp = b.timestamp AND n.id < b.id))
      )
    ORDER BY b.name ASC
";

impl SqliteBeaconStore {
    /// Device reconciliation pass: create missing devices from the aircraft
    /// beacon stream (phase A), then backfill `device_id` on unlinked
    /// beacons (phase C). Safe to re-run at any time.
    pub fn update_devices(&mut self) -> Result<DeviceReconcileReport, CoreError> {
        let mut report = DeviceReconcileReport::default();

        let tx = self
            .conn
            .transaction()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        report.inserted_devices = tx
            .execute(
                "
                INSERT INTO devices (address)
                SELECT DISTINCT address
                FROM aircraft_beacons
                WHERE device_id IS NULL
                  AND address NOT IN (SELECT address FROM devices)
                ON CONFLICT(address) DO NOTHING
                ",
                [],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        tx.commit()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let tx = self
            .conn
            .transaction()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        report.linked_aircraft_beacons = tx
            .execute(
                "
                UPDATE aircraft_beacons
                SET device_id = (SELECT d.id FROM devices d WHERE d.address = aircraft_beacons.address)
                WHERE device_id IS NULL
                  AND EXISTS (SELECT 1 FROM devices d WHERE d.address = aircraft_beacons.address)
                ",
                [],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        tx.commit()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        Ok(report)
    }

    /// Receiver reconciliation pass: create missing receivers (phase A),
    /// re-synchronize location and status from the latest qualifying beacons
    /// (phase B, two independent sub-passes), then backfill `receiver_id` on
    /// receiver beacons and aircraft beacons (phase C).
    pub fn update_receivers(&mut self) -> Result<ReceiverReconcileReport, CoreError> {
        let mut report = ReceiverReconcileReport::default();

        let tx = self
            .conn
            .transaction()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        report.inserted_receivers = tx
            .execute(
                "
                INSERT INTO receivers (name)
                SELECT DISTINCT name
                FROM receiver_beacons
                WHERE receiver_id IS NULL
                  AND name NOT IN (SELECT name FROM receivers)
                ON CONFLICT(name) DO NOTHING
                ",
                [],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        tx.commit()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        report.updated_positions = self.sync_receiver_positions()?;
        report.updated_statuses = self.sync_receiver_statuses()?;

        let tx = self
            .conn
            .transaction()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        report.linked_receiver_beacons = tx
            .execute(
                "
                UPDATE receiver_beacons
                SET receiver_id = (SELECT r.id FROM receivers r WHERE r.name = receiver_beacons.name)
                WHERE receiver_id IS NULL
                  AND EXISTS (SELECT 1 FROM receivers r WHERE r.name = receiver_beacons.name)
                ",
                [],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        report.linked_aircraft_beacons = tx
            .execute(
                "
                UPDATE aircraft_beacons
                SET receiver_id = (SELECT r.id FROM receivers r WHERE r.name = aircraft_beacons.receiver_name)
                WHERE receiver_id IS NULL
                  AND receiver_name IS NOT NULL
                  AND EXISTS (SELECT 1 FROM receivers r WHERE r.name = aircraft_beacons.receiver_name)
                ",
                [],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        tx.commit()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        Ok(report)
    }

    /// Phase B, location: read the latest complete-position beacon per
    /// receiver, then update receivers whose stored location or altitude
    /// differs. A location change invalidates the cached country code.
    fn sync_receiver_positions(&mut self) -> Result<usize, CoreError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let latest = {
            let mut stmt = tx
                .prepare(LATEST_POSITION_SQL)
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Self::map_receiver_beacon_row(row).map_err(to_from_sql_error)
                })
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|err| CoreError::Persistence(err.to_string()))?
        };

        let mut updated = 0;
        for beacon in latest {
            let changed = position_changed(&tx, &beacon)?;
            if !changed {
                continue;
            }
            updated += tx
                .execute(
                    "
                    UPDATE receivers
                    SET latitude = ?2, longitude = ?3, altitude = ?4, country_code = NULL
                    WHERE name = ?1
                    ",
                    params![
                        beacon.name.as_str(),
                        beacon.latitude,
                        beacon.longitude,
                        beacon.altitude,
                    ],
                )
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
        }

        tx.commit()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(updated)
    }

    /// Phase B, status: read the latest complete-status beacon per receiver,
    /// then update receivers whose stored version is missing or differs.
    fn sync_receiver_statuses(&mut self) -> Result<usize, CoreError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let latest = {
            let mut stmt = tx
                .prepare(LATEST_STATUS_SQL)
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Self::map_receiver_beacon_row(row).map_err(to_from_sql_error)
                })
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|err| CoreError::Persistence(err.to_string()))?
        };

        let mut updated = 0;
        for beacon in latest {
            let stored: Option<(Option<String>, Option<String>)> = tx
                .query_row(
                    "SELECT version, platform FROM receivers WHERE name = ?1",
                    params![beacon.name.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
            let Some((stored_version, stored_platform)) = stored else {
                continue;
            };

            let changed = stored_version.is_none()
                || stored_platform.is_none()
                || stored_version.as_deref() != beacon.version.as_deref();
            if !changed {
                continue;
            }
            updated += tx
                .execute(
                    "UPDATE receivers SET version = ?2, platform = ?3 WHERE name = ?1",
                    params![beacon.name.as_str(), beacon.version, beacon.platform],
                )
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
        }

        tx.commit()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(updated)
    }
}

fn position_changed(
    tx: &rusqlite::Transaction<'_>,
    beacon: &ReceiverBeacon,
) -> Result<bool, CoreError> {
    let stored: Option<(Option<f64>, Option<f64>, Option<f64>)> = tx
        .query_row(
            "SELECT latitude, longitude, altitude FROM receivers WHERE name = ?1",
            params![beacon.name.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(|err| CoreError::Persistence(err.to_string()))?;

    // A receiver that predates this pass's phase A (or was created by the
    // directory import) may be absent; nothing to sync then.
    let Some((latitude, longitude, altitude)) = stored else {
        return Ok(false);
    };

    Ok(latitude != beacon.latitude || longitude != beacon.longitude || altitude != beacon.altitude)
}
