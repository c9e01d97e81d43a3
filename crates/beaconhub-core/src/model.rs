use chrono::{DateTime, Utc};

use crate::identifiers::{DeviceAddress, ReceiverName};

/// Identity fields emitted for aircraft without a tracked-identity record.
/// The same constants are used for every untracked aircraft so the live map
/// cannot distinguish one untracked aircraft from another.
pub const ANONYMOUS_REGISTRATION: &str = "4711abcd";
pub const ANONYMOUS_COMPETITION: &str = "_c";

/// One stored aircraft position report. Immutable once written; the only
/// columns the engine ever touches afterwards are the two foreign keys.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftBeacon {
    pub id: i64,
    pub address: DeviceAddress,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub track: Option<i64>,
    pub ground_speed: Option<f64>,
    pub climb_rate: Option<f64>,
    pub aircraft_type: Option<i64>,
    pub receiver_name: Option<ReceiverName>,
    pub device_id: Option<i64>,
    pub receiver_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAircraftBeacon {
    pub address: DeviceAddress,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub track: Option<i64>,
    pub ground_speed: Option<f64>,
    pub climb_rate: Option<f64>,
    pub aircraft_type: Option<i64>,
    pub receiver_name: Option<ReceiverName>,
}

/// One stored receiver status report. Position and status fields are both
/// optional: a receiver may report either, neither, or both in one beacon.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverBeacon {
    pub id: i64,
    pub name: ReceiverName,
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub receiver_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReceiverBeacon {
    pub name: ReceiverName,
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub version: Option<String>,
    pub platform: Option<String>,
}

/// Reference row keyed by hardware address. Created lazily by the device
/// reconciliation pass; enrichment columns live with the directory-import
/// collaborator, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: i64,
    pub address: DeviceAddress,
}

/// Reference row keyed by receiver name. Location and status columns are
/// re-synchronized from the beacon stream by the receiver reconciliation
/// pass; `country_code` is cleared whenever the location changes and filled
/// back in by the geocoding pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    pub id: i64,
    pub name: ReceiverName,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub country_code: Option<String>,
}

/// External registry record linking a hardware address to its public
/// registration and competition id. Read-only to this engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedIdentity {
    pub address: DeviceAddress,
    pub registration: String,
    pub competition: String,
}

/// Outcome of joining a resolved beacon against the tracked-identity
/// registry. `Unknown` is mapped to the fixed placeholder values at
/// serialization time only; the raw hardware address never leaves the
/// engine for an untracked aircraft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedIdentity {
    Known(TrackedIdentity),
    Unknown,
}
