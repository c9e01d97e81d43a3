use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::error::CoreError;

mod sqlite_impl;

pub(crate) use sqlite_impl::to_from_sql_error;

const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Handle to the relational store holding beacon, reference, and
/// tracked-identity tables. One handle wraps one SQLite connection; callers
/// that need concurrent access open additional handles against the same
/// database file.
pub struct SqliteBeaconStore {
    pub(crate) conn: Connection,
}

impl SqliteBeaconStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|err| CoreError::Persistence(err.to_string()))?;
        let mut store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, CoreError> {
        let conn =
            Connection::open_in_memory().map_err(|err| CoreError::Persistence(err.to_string()))?;
        let mut store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<u32, CoreError> {
        self.current_schema_version()
    }

    fn bootstrap(&mut self) -> Result<(), CoreError> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let current = self.current_schema_version()?;
        if current > CURRENT_SCHEMA_VERSION {
            return Err(CoreError::UnsupportedSchemaVersion {
                supported: CURRENT_SCHEMA_VERSION,
                found: current,
            });
        }

        self.apply_pending_migrations(current)
    }

    fn table_exists(&self, name: &str) -> Result<bool, CoreError> {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1",
                rusqlite::params![name],
                |_| Ok(()),
            )
            .optional()
            .map(|opt| opt.is_some())
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn current_schema_version(&self) -> Result<u32, CoreError> {
        if !self.table_exists("schema_migrations")? {
            return Ok(0);
        }

        self.conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn apply_pending_migrations(&mut self, current: u32) -> Result<(), CoreError> {
        for version in (current + 1)..=CURRENT_SCHEMA_VERSION {
            let tx = self
                .conn
                .transaction()
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
            Self::apply_migration(&tx, version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                rusqlite::params![version],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
            tx.commit()
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
        }

        Ok(())
    }

    fn apply_migration(tx: &Transaction<'_>, version: u32) -> Result<(), CoreError> {
        match version {
            1 => tx
                .execute_batch(
                    "
                    CREATE TABLE schema_migrations (
                        version INTEGER PRIMARY KEY,
                        applied_at TEXT NOT NULL
                    );

                    CREATE TABLE aircraft_beacons (
                        id INTEGER PRIMARY KEY,
                        address TEXT NOT NULL,
                        timestamp INTEGER NOT NULL,
                        latitude REAL NOT NULL,
                        longitude REAL NOT NULL,
                        altitude REAL,
                        track INTEGER,
                        ground_speed REAL,
                        climb_rate REAL,
                        aircraft_type INTEGER,
                        receiver_name TEXT,
                        device_id INTEGER,
                        receiver_id INTEGER
                    );

                    CREATE TABLE receiver_beacons (
                        id INTEGER PRIMARY KEY,
                        name TEXT NOT NULL,
                        timestamp INTEGER NOT NULL,
                        latitude REAL,
                        longitude REAL,
                        altitude REAL,
                        version TEXT,
                        platform TEXT,
                        receiver_id INTEGER
                    );

                    CREATE TABLE devices (
                        id INTEGER PRIMARY KEY,
                        address TEXT NOT NULL UNIQUE
                    );

                    CREATE TABLE receivers (
                        id INTEGER PRIMARY KEY,
                        name TEXT NOT NULL UNIQUE,
                        latitude REAL,
                        longitude REAL,
                        altitude REAL,
                        version TEXT,
                        platform TEXT,
                        country_code TEXT
                    );

                    CREATE TABLE tracked_identities (
                        address TEXT PRIMARY KEY,
                        registration TEXT NOT NULL,
                        competition TEXT NOT NULL
                    );

                    CREATE INDEX idx_aircraft_beacons_address_time ON aircraft_beacons(address, timestamp DESC);
                    CREATE INDEX idx_aircraft_beacons_unlinked_device ON aircraft_beacons(address) WHERE device_id IS NULL;
                    CREATE INDEX idx_aircraft_beacons_unlinked_receiver ON aircraft_beacons(receiver_name) WHERE receiver_id IS NULL;
                    CREATE INDEX idx_receiver_beacons_name_time ON receiver_beacons(name, timestamp DESC);
                    CREATE INDEX idx_receiver_beacons_unlinked ON receiver_beacons(name) WHERE receiver_id IS NULL;
                    ",
                )
                .map_err(|err| CoreError::Persistence(err.to_string())),
            _ => Err(CoreError::Persistence(format!(
                "no migration implementation for version {version}"
            ))),
        }
    }
}
