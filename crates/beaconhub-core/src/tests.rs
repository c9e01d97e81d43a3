use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;

use crate::*;


fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("timestamp")
}

fn aircraft_beacon(
    address: &str,
    timestamp: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
) -> NewAircraftBeacon {
    NewAircraftBeacon {
        address: address.into(),
        timestamp,
        latitude,
        longitude,
        altitude: Some(650.0),
        track: Some(180),
        ground_speed: Some(95.0),
        climb_rate: Some(1.2),
        aircraft_type: Some(1),
        receiver_name: Some("Koenigsdf".into()),
    }
}

fn receiver_position_beacon(
    name: &str,
    timestamp: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    altitude: f64,
) -> NewReceiverBeacon {
    NewReceiverBeacon {
        name: name.into(),
        timestamp,
        latitude: Some(latitude),
        longitude: Some(longitude),
        altitude: Some(altitude),
        version: None,
        platform: None,
    }
}

fn receiver_status_beacon(
    name: &str,
    timestamp: DateTime<Utc>,
    version: &str,
    platform: &str,
) -> NewReceiverBeacon {
    NewReceiverBeacon {
        name: name.into(),
        timestamp,
        latitude: None,
        longitude: None,
        altitude: None,
        version: Some(version.to_owned()),
        platform: Some(platform.to_owned()),
    }
}

#[test]
fn initialization_creates_required_schema_and_version() {
    let db = test_support::TestDbPath::new("init");

    let store = SqliteBeaconStore::open(db.path()).expect("open store");
    assert_eq!(store.schema_version().expect("schema version"), 1);
    drop(store);

    let conn = rusqlite::Connection::open(db.path()).expect("open sqlite for inspection");
    let tables = [
        "schema_migrations",
        "aircraft_beacons",
        "receiver_beacons",
        "devices",
        "receivers",
        "tracked_identities",
    ];
    for table in tables {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                rusqlite::params![table],
                |row| row.get(0),
            )
            .optional()
            .expect("query table existence");
        assert_eq!(exists, Some(1), "missing table {table}");
    }
}

#[test]
fn startup_is_idempotent_and_does_not_duplicate_migrations() {
    let db = test_support::TestDbPath::new("idempotent");

    let first = SqliteBeaconStore::open(db.path()).expect("first open");
    assert_eq!(first.schema_version().expect("schema version"), 1);
    drop(first);

    let second = SqliteBeaconStore::open(db.path()).expect("second open");
    assert_eq!(second.schema_version().expect("schema version"), 1);
    drop(second);

    let conn = rusqlite::Connection::open(db.path()).expect("open sqlite for inspection");
    let migration_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .expect("count migrations");
    assert_eq!(migration_count, 1);
}

#[test]
fn duplicate_key_and_timestamp_beacons_are_accepted_at_ingest() {
    let store = SqliteBeaconStore::in_memory().expect("in-memory store");

    let first = store
        .insert_aircraft_beacon(&aircraft_beacon("DDA5BA", ts(1_000), 47.0, 11.0))
        .expect("insert first");
    let second = store
        .insert_aircraft_beacon(&aircraft_beacon("DDA5BA", ts(1_000), 47.0, 11.0))
        .expect("insert duplicate");

    assert_ne!(first, second);
}

#[test]
fn tracked_identity_upsert_replaces_registration_and_competition() {
    let store = SqliteBeaconStore::in_memory().expect("in-memory store");

    store
        .upsert_tracked_identity(&TrackedIdentity {
            address: "DDA5BA".into(),
            registration: "D-5123".to_owned(),
            competition: "S8".to_owned(),
        })
        .expect("first upsert");
    store
        .upsert_tracked_identity(&TrackedIdentity {
            address: "DDA5BA".into(),
            registration: "D-9876".to_owned(),
            competition: "XY".to_owned(),
        })
        .expect("second upsert");

    let identity = store
        .find_tracked_identity(&"DDA5BA".into())
        .expect("lookup")
        .expect("identity exists");
    assert_eq!(identity.registration, "D-9876");
    assert_eq!(identity.competition, "XY");
}
