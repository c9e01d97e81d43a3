mod error;
mod geocode;
mod identifiers;
mod model;
mod projector;
mod reconciler;
mod resolver;
mod store;
pub mod test_support;

pub use error::CoreError;
pub use geocode::{update_country_codes, CountryCodeReport, CountryCodeResolver};
pub use identifiers::{DeviceAddress, ReceiverName};
pub use model::{
    AircraftBeacon, Device, NewAircraftBeacon, NewReceiverBeacon, Receiver, ReceiverBeacon,
    ResolvedIdentity, TrackedIdentity, ANONYMOUS_COMPETITION, ANONYMOUS_REGISTRATION,
};
pub use projector::{LiveAircraft, LiveMapRequest, ReceiverStatus};
pub use reconciler::{DeviceReconcileReport, ReceiverReconcileReport};
pub use resolver::{BoundingBox, TimeWindow};
pub use store::SqliteBeaconStore;

pub mod wire;

#[cfg(test)]
mod tests;
