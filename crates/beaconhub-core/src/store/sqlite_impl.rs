use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::error::CoreError;
use crate::identifiers::{DeviceAddress, ReceiverName};
use crate::model::{
    AircraftBeacon, Device, NewAircraftBeacon, NewReceiverBeacon, Receiver, ReceiverBeacon,
    TrackedIdentity,
};
use crate::store::SqliteBeaconStore;

pub(crate) fn to_from_sql_error(err: CoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::other(err.to_string())),
    )
}

pub(crate) fn decode_timestamp(secs: i64) -> Result<DateTime<Utc>, CoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CoreError::Persistence(format!("timestamp '{secs}' is out of range")))
}

impl SqliteBeaconStore {
    /// Appends one aircraft position report. Duplicate `(address, timestamp)`
    /// pairs are accepted; re-transmissions are disambiguated by the
    /// resolver's tie-break, not rejected at ingest.
    pub fn insert_aircraft_beacon(&self, beacon: &NewAircraftBeacon) -> Result<i64, CoreError> {
        self.conn
            .execute(
                "
                INSERT INTO aircraft_beacons (
                    address, timestamp, latitude, longitude, altitude, track,
                    ground_speed, climb_rate, aircraft_type, receiver_name
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ",
                params![
                    beacon.address.as_str(),
                    beacon.timestamp.timestamp(),
                    beacon.latitude,
                    beacon.longitude,
                    beacon.altitude,
                    beacon.track,
                    beacon.ground_speed,
                    beacon.climb_rate,
                    beacon.aircraft_type,
                    beacon.receiver_name.as_ref().map(|name| name.as_str()),
                ],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Appends one receiver status report. See [`Self::insert_aircraft_beacon`]
    /// for the duplicate-timestamp contract.
    pub fn insert_receiver_beacon(&self, beacon: &NewReceiverBeacon) -> Result<i64, CoreError> {
        self.conn
            .execute(
                "
                INSERT INTO receiver_beacons (
                    name, timestamp, latitude, longitude, altitude, version, platform
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
                params![
                    beacon.name.as_str(),
                    beacon.timestamp.timestamp(),
                    beacon.latitude,
                    beacon.longitude,
                    beacon.altitude,
                    beacon.version,
                    beacon.platform,
                ],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Write path for the external registry import; the engine itself only
    /// reads this table.
    pub fn upsert_tracked_identity(&self, identity: &TrackedIdentity) -> Result<(), CoreError> {
        self.conn
            .execute(
                "
                INSERT INTO tracked_identities (address, registration, competition)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(address) DO UPDATE SET
                    registration = excluded.registration,
                    competition = excluded.competition
                ",
                params![
                    identity.address.as_str(),
                    identity.registration,
                    identity.competition,
                ],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        Ok(())
    }

    pub fn find_tracked_identity(
        &self,
        address: &DeviceAddress,
    ) -> Result<Option<TrackedIdentity>, CoreError> {
        self.conn
            .query_row(
                "
                SELECT address, registration, competition
                FROM tracked_identities
                WHERE address = ?1
                ",
                params![address.as_str()],
                |row| {
                    Ok(TrackedIdentity {
                        address: row.get::<_, String>(0)?.into(),
                        registration: row.get(1)?,
                        competition: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    pub fn find_device_by_address(
        &self,
        address: &DeviceAddress,
    ) -> Result<Option<Device>, CoreError> {
        self.conn
            .query_row(
                "SELECT id, address FROM devices WHERE address = ?1",
                params![address.as_str()],
                |row| {
                    Ok(Device {
                        id: row.get(0)?,
                        address: row.get::<_, String>(1)?.into(),
                    })
                },
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    pub fn find_receiver_by_name(
        &self,
        name: &ReceiverName,
    ) -> Result<Option<Receiver>, CoreError> {
        self.conn
            .query_row(
                "
                SELECT id, name, latitude, longitude, altitude, version, platform, country_code
                FROM receivers
                WHERE name = ?1
                ",
                params![name.as_str()],
                Self::map_receiver_row,
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    pub fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, address FROM devices ORDER BY address ASC")
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Device {
                    id: row.get(0)?,
                    address: row.get::<_, String>(1)?.into(),
                })
            })
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    pub fn list_receivers(&self) -> Result<Vec<Receiver>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, latitude, longitude, altitude, version, platform, country_code
                FROM receivers
                ORDER BY name ASC
                ",
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let rows = stmt
            .query_map([], Self::map_receiver_row)
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    /// Receivers with a known location but no country code yet: the
    /// candidate set of the geocoding pass.
    pub fn receivers_missing_country_code(&self) -> Result<Vec<Receiver>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, latitude, longitude, altitude, version, platform, country_code
                FROM receivers
                WHERE country_code IS NULL
                  AND latitude IS NOT NULL
                  AND longitude IS NOT NULL
                ORDER BY name ASC
                ",
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let rows = stmt
            .query_map([], Self::map_receiver_row)
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    pub fn set_receiver_country_code(
        &self,
        name: &ReceiverName,
        country_code: &str,
    ) -> Result<(), CoreError> {
        self.conn
            .execute(
                "UPDATE receivers SET country_code = ?2 WHERE name = ?1",
                params![name.as_str(), country_code],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        Ok(())
    }

    fn map_receiver_row(row: &Row<'_>) -> Result<Receiver, rusqlite::Error> {
        Ok(Receiver {
            id: row.get(0)?,
            name: row.get::<_, String>(1)?.into(),
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            altitude: row.get(4)?,
            version: row.get(5)?,
            platform: row.get(6)?,
            country_code: row.get(7)?,
        })
    }

    pub(crate) fn map_aircraft_beacon_row(row: &Row<'_>) -> Result<AircraftBeacon, CoreError> {
        Ok(AircraftBeacon {
            id: row
                .get(0)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            address: row
                .get::<_, String>(1)
                .map_err(|err| CoreError::Persistence(err.to_string()))?
                .into(),
            timestamp: decode_timestamp(
                row.get(2)
                    .map_err(|err| CoreError::Persistence(err.to_string()))?,
            )?,
            latitude: row
                .get(3)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            longitude: row
                .get(4)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            altitude: row
                .get(5)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            track: row
                .get(6)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            ground_speed: row
                .get(7)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            climb_rate: row
                .get(8)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            aircraft_type: row
                .get(9)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            receiver_name: row
                .get::<_, Option<String>>(10)
                .map_err(|err| CoreError::Persistence(err.to_string()))?
                .map(ReceiverName::from),
            device_id: row
                .get(11)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            receiver_id: row
                .get(12)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
        })
    }

    pub(crate) fn map_receiver_beacon_row(row: &Row<'_>) -> Result<ReceiverBeacon, CoreError> {
        Ok(ReceiverBeacon {
            id: row
                .get(0)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            name: row
                .get::<_, String>(1)
                .map_err(|err| CoreError::Persistence(err.to_string()))?
                .into(),
            timestamp: decode_timestamp(
                row.get(2)
                    .map_err(|err| CoreError::Persistence(err.to_string()))?,
            )?,
            latitude: row
                .get(3)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            longitude: row
                .get(4)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            altitude: row
                .get(5)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            version: row
                .get(6)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            platform: row
                .get(7)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
            receiver_id: row
                .get(8)
                .map_err(|err| CoreError::Persistence(err.to_string()))?,
        })
    }
}
