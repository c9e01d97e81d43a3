//! Live-state projection: the privacy-filtered snapshot served on the public
//! maps. Read-only; always reflects whatever reference state is currently
//! committed.

use chrono::{DateTime, Duration, Utc};

use crate::error::CoreError;
use crate::model::{AircraftBeacon, ResolvedIdentity};
use crate::resolver::{BoundingBox, TimeWindow};
use crate::store::SqliteBeaconStore;

/// A receiver's most recent beacon is allowed to be this old before the
/// receiver is shown as offline.
const RECEIVER_ONLINE_WINDOW_MINUTES: i64 = 10;

/// Without the show-offline flag, aircraft disappear from the live map this
/// long after their last beacon.
const AIRCRAFT_LIVE_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveMapRequest {
    pub bounding_box: BoundingBox,
    /// When set, include last-known positions from the whole of today (UTC)
    /// instead of only the last five minutes. Daily flight review vs.
    /// real-time traffic.
    pub show_offline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveAircraft {
    pub beacon: AircraftBeacon,
    pub identity: ResolvedIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverStatus {
    pub name: crate::identifiers::ReceiverName,
    pub latitude: f64,
    pub longitude: f64,
    pub is_online: bool,
}

impl SqliteBeaconStore {
    /// Currently visible aircraft for the live map: the latest beacon per
    /// address inside the request window and box, each joined against the
    /// tracked-identity registry. Addresses without a registry entry come
    /// back as `ResolvedIdentity::Unknown`.
    pub fn live_aircraft(
        &self,
        request: &LiveMapRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<LiveAircraft>, CoreError> {
        let start = if request.show_offline {
            now.date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|start| start.and_utc())
                .unwrap_or(now)
        } else {
            now - Duration::minutes(AIRCRAFT_LIVE_WINDOW_MINUTES)
        };
        let window = TimeWindow::since(start);

        let beacons = self.latest_aircraft_beacons(&window, Some(&request.bounding_box))?;
        let mut rows = Vec::with_capacity(beacons.len());
        for beacon in beacons {
            let identity = match self.find_tracked_identity(&beacon.address)? {
                Some(identity) => ResolvedIdentity::Known(identity),
                None => ResolvedIdentity::Unknown,
            };
            rows.push(LiveAircraft { beacon, identity });
        }

        Ok(rows)
    }

    /// Online/offline snapshot for the receiver map: the latest beacon per
    /// receiver over the full history, regardless of bounding box. A
    /// receiver is online iff that beacon is at most ten minutes old.
    /// Receivers whose latest beacon carries no position are omitted (there
    /// is nothing to place on the map). Ordered by name ascending.
    pub fn receiver_statuses(&self, now: DateTime<Utc>) -> Result<Vec<ReceiverStatus>, CoreError> {
        let cutoff = now - Duration::minutes(RECEIVER_ONLINE_WINDOW_MINUTES);
        let beacons = self.latest_receiver_beacons(&TimeWindow::all(), None)?;

        Ok(beacons
            .into_iter()
            .filter_map(|beacon| {
                let (latitude, longitude) = match (beacon.latitude, beacon.longitude) {
                    (Some(latitude), Some(longitude)) => (latitude, longitude),
                    _ => return None,
                };
                Some(ReceiverStatus {
                    name: beacon.name,
                    latitude,
                    longitude,
                    is_online: beacon.timestamp > cutoff,
                })
            })
            .collect())
    }
}
