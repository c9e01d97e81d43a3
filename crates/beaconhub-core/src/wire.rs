//! XML serialization of the projector's row sets. Pure and total: empty
//! input yields a well-formed empty `<markers>` document.

use crate::model::{ResolvedIdentity, ANONYMOUS_COMPETITION, ANONYMOUS_REGISTRATION};
use crate::projector::{LiveAircraft, ReceiverStatus};

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// Receiver status map document (`/rec.php`). One `<m>` row per receiver,
/// plus the fixed `<m e="0"/>` sentinel the consumer expects first.
pub fn receiver_status_xml(statuses: &[ReceiverStatus]) -> String {
    let mut lines = vec![
        XML_HEADER.to_owned(),
        "<markers>".to_owned(),
        "<m e=\"0\"/>".to_owned(),
    ];
    for status in statuses {
        lines.push(format!(
            "<m a=\"{}\" b=\"{:.7}\" c=\"{:.7}\" d=\"{}\"/>",
            status.name,
            status.latitude,
            status.longitude,
            i32::from(status.is_online),
        ));
    }
    lines.push("</markers>".to_owned());
    lines.join("\n")
}

/// Live aircraft map document (`/lxml.php`). Identity fields of untracked
/// aircraft are the fixed placeholder values and a zero address; the raw
/// hardware address is never emitted for them.
pub fn live_aircraft_xml(rows: &[LiveAircraft]) -> String {
    let mut lines = vec![XML_HEADER.to_owned(), "<markers>".to_owned()];
    for row in rows {
        let (competition, registration, address) = match &row.identity {
            ResolvedIdentity::Known(identity) => (
                identity.competition.as_str(),
                identity.registration.as_str(),
                identity.address.as_str(),
            ),
            ResolvedIdentity::Unknown => (ANONYMOUS_COMPETITION, ANONYMOUS_REGISTRATION, "0"),
        };
        let beacon = &row.beacon;
        lines.push(format!(
            "<m a=\"{:.7},{:.7},{},{},{},{},{},{},{},{},{},{},{}\"/>",
            beacon.latitude,
            beacon.longitude,
            competition,
            registration,
            opt_f64(beacon.altitude),
            beacon.timestamp.format("%Y-%m-%d %H:%M:%S"),
            opt_i64(beacon.track),
            opt_f64(beacon.ground_speed),
            opt_f64(beacon.climb_rate),
            opt_i64(beacon.aircraft_type),
            beacon
                .receiver_name
                .as_ref()
                .map(|name| name.as_str())
                .unwrap_or(""),
            address,
            registration,
        ));
    }
    lines.push("</markers>".to_owned());
    lines.join("\n")
}

// Whole values keep a trailing `.0` (e.g. `650.0`, never `650`); that is
// the float formatting the map consumers have always been fed.
fn opt_f64(value: Option<f64>) -> String {
    match value {
        Some(value) if value.fract() == 0.0 => format!("{value:.1}"),
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

fn opt_i64(value: Option<i64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}
