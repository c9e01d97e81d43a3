//! The two legacy map endpoints. Field names in the query string are
//! single letters because the original map clients send them that way;
//! anything malformed falls back to the widest possible view instead of
//! rejecting the request.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;

use beaconhub_core::{wire, BoundingBox, LiveMapRequest, SqliteBeaconStore};

use crate::error::ApiResult;

const TEXT_XML: &str = "text/xml; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<SqliteBeaconStore>>,
}

impl AppState {
    pub fn new(store: SqliteBeaconStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rec.php", get(receiver_status_map))
        .route(
            "/lxml.php",
            get(live_aircraft_map).post(live_aircraft_map_form),
        )
        .with_state(state)
}

/// Query parameters of `/lxml.php`: `a` toggles show-offline, `b`/`c` are
/// the latitude bounds and `d`/`e` the longitude bounds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapQuery {
    a: Option<String>,
    b: Option<String>,
    c: Option<String>,
    d: Option<String>,
    e: Option<String>,
}

pub async fn receiver_status_map(State(state): State<AppState>) -> ApiResult<Response> {
    let store = state.store.lock().await;
    let statuses = store.receiver_statuses(Utc::now())?;
    drop(store);

    Ok(xml_response(wire::receiver_status_xml(&statuses)))
}

pub async fn live_aircraft_map(
    State(state): State<AppState>,
    Query(query): Query<MapQuery>,
) -> ApiResult<Response> {
    render_live_aircraft(state, query).await
}

/// Same document as [`live_aircraft_map`]; some map clients POST the
/// parameters as a form body instead.
pub async fn live_aircraft_map_form(
    State(state): State<AppState>,
    Form(query): Form<MapQuery>,
) -> ApiResult<Response> {
    render_live_aircraft(state, query).await
}

async fn render_live_aircraft(state: AppState, query: MapQuery) -> ApiResult<Response> {
    let request = LiveMapRequest {
        bounding_box: bounding_box_from(&query),
        show_offline: show_offline_from(&query),
    };

    let store = state.store.lock().await;
    let rows = store.live_aircraft(&request, Utc::now())?;
    drop(store);

    Ok(xml_response(wire::live_aircraft_xml(&rows)))
}

fn xml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, TEXT_XML)], body).into_response()
}

// Presence-based: any non-empty value turns the flag on, matching what the
// map clients have always sent.
fn show_offline_from(query: &MapQuery) -> bool {
    query
        .a
        .as_deref()
        .map(|raw| !raw.trim().is_empty())
        .unwrap_or(false)
}

fn bounding_box_from(query: &MapQuery) -> BoundingBox {
    let lat_max = parse_or(query.b.as_deref(), 90.0);
    let lat_min = parse_or(query.c.as_deref(), -90.0);
    let lon_max = parse_or(query.d.as_deref(), 180.0);
    let lon_min = parse_or(query.e.as_deref(), -180.0);

    // Clients occasionally send the bounds reversed.
    BoundingBox {
        lat_min: lat_min.min(lat_max),
        lat_max: lat_min.max(lat_max),
        lon_min: lon_min.min(lon_max),
        lon_max: lon_min.max(lon_max),
    }
}

fn parse_or(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beaconhub_core::{NewReceiverBeacon, ReceiverName};
    use chrono::{Duration, Utc};

    fn query(a: Option<&str>, b: Option<&str>, c: Option<&str>) -> MapQuery {
        MapQuery {
            a: a.map(str::to_owned),
            b: b.map(str::to_owned),
            c: c.map(str::to_owned),
            d: None,
            e: None,
        }
    }

    #[test]
    fn missing_parameters_fall_back_to_the_world_box() {
        let bounds = bounding_box_from(&MapQuery::default());
        assert_eq!(bounds.lat_min, -90.0);
        assert_eq!(bounds.lat_max, 90.0);
        assert_eq!(bounds.lon_min, -180.0);
        assert_eq!(bounds.lon_max, 180.0);
    }

    #[test]
    fn malformed_floats_fall_back_to_defaults() {
        let bounds = bounding_box_from(&query(None, Some("not-a-number"), Some("48.5")));
        assert_eq!(bounds.lat_max, 90.0);
        assert_eq!(bounds.lat_min, 48.5);
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let bounds = bounding_box_from(&query(None, Some("45.0"), Some("48.0")));
        assert_eq!(bounds.lat_min, 45.0);
        assert_eq!(bounds.lat_max, 48.0);
    }

    #[test]
    fn show_offline_is_presence_based() {
        assert!(show_offline_from(&query(Some("1"), None, None)));
        assert!(show_offline_from(&query(Some("0"), None, None)));
        assert!(show_offline_from(&query(Some("yes"), None, None)));
        assert!(!show_offline_from(&query(Some(""), None, None)));
        assert!(!show_offline_from(&query(Some("   "), None, None)));
        assert!(!show_offline_from(&MapQuery::default()));
    }

    #[tokio::test]
    async fn receiver_map_serves_xml() {
        let store = SqliteBeaconStore::in_memory().expect("in-memory store");
        store
            .insert_receiver_beacon(&NewReceiverBeacon {
                name: ReceiverName::from("Koenigsdf"),
                timestamp: Utc::now() - Duration::minutes(1),
                latitude: Some(47.8),
                longitude: Some(11.4),
                altitude: Some(600.0),
                version: None,
                platform: None,
            })
            .expect("insert beacon");

        let response = receiver_status_map(State(AppState::new(store)))
            .await
            .expect("handler")
            .into_response();

        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some(TEXT_XML)
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = String::from_utf8(body.to_vec()).expect("utf-8 body");
        assert!(body.contains("<m e=\"0\"/>"));
        assert!(body.contains("Koenigsdf"));
        assert!(body.contains("d=\"1\""));
    }

    #[tokio::test]
    async fn live_map_serves_an_empty_document_for_an_empty_store() {
        let store = SqliteBeaconStore::in_memory().expect("in-memory store");

        let response = live_aircraft_map(
            State(AppState::new(store)),
            Query(MapQuery::default()),
        )
        .await
        .expect("handler")
        .into_response();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = String::from_utf8(body.to_vec()).expect("utf-8 body");
        assert!(body.starts_with("<?xml"));
        assert!(body.contains("<markers>"));
        assert!(!body.contains("<m a="));
    }
}
