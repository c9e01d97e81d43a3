//! Background pass scheduling. Each pass runs on its own interval with its
//! own store handle, so a slow pass never blocks the others and no pass can
//! overlap itself. A failed run is logged and retried on the next tick.

use std::time::Duration;

use anyhow::Context;
use tokio::time::{interval, MissedTickBehavior};

use beaconhub_config::BeaconhubConfig;
use beaconhub_core::{
    update_country_codes, DeviceReconcileReport, ReceiverReconcileReport, SqliteBeaconStore,
};

use crate::geocode::NominatimResolver;

pub fn spawn_passes(config: &BeaconhubConfig) -> anyhow::Result<()> {
    spawn_device_pass(
        &config.database_path,
        Duration::from_secs(config.reconcile.device_pass_interval_secs),
    )?;
    spawn_receiver_pass(
        &config.database_path,
        Duration::from_secs(config.reconcile.receiver_pass_interval_secs),
    )?;
    spawn_geocode_pass(&config.database_path, config)?;
    Ok(())
}

fn spawn_device_pass(database_path: &str, period: Duration) -> anyhow::Result<()> {
    let mut store =
        SqliteBeaconStore::open(database_path).context("open store for the device pass")?;

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.update_devices() {
                Ok(report) if report == DeviceReconcileReport::default() => {}
                Ok(report) => tracing::info!(
                    inserted = report.inserted_devices,
                    linked = report.linked_aircraft_beacons,
                    "device pass"
                ),
                Err(error) => tracing::error!(error = %error, "device pass failed"),
            }
        }
    });

    Ok(())
}

fn spawn_receiver_pass(database_path: &str, period: Duration) -> anyhow::Result<()> {
    let mut store =
        SqliteBeaconStore::open(database_path).context("open store for the receiver pass")?;

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.update_receivers() {
                Ok(report) if report == ReceiverReconcileReport::default() => {}
                Ok(report) => tracing::info!(
                    inserted = report.inserted_receivers,
                    positions = report.updated_positions,
                    statuses = report.updated_statuses,
                    linked_receiver_beacons = report.linked_receiver_beacons,
                    linked_aircraft_beacons = report.linked_aircraft_beacons,
                    "receiver pass"
                ),
                Err(error) => tracing::error!(error = %error, "receiver pass failed"),
            }
        }
    });

    Ok(())
}

fn spawn_geocode_pass(database_path: &str, config: &BeaconhubConfig) -> anyhow::Result<()> {
    let mut store =
        SqliteBeaconStore::open(database_path).context("open store for the geocode pass")?;
    let resolver =
        NominatimResolver::new(&config.geocode).context("build the reverse-geocoding client")?;
    let period = Duration::from_secs(config.geocode.pass_interval_secs);

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match update_country_codes(&mut store, &resolver).await {
                Ok(report) if report.resolved == 0 && report.unresolved == 0 => {}
                Ok(report) => tracing::info!(
                    resolved = report.resolved,
                    unresolved = report.unresolved,
                    "geocode pass"
                ),
                Err(error) => tracing::error!(error = %error, "geocode pass failed"),
            }
        }
    });

    Ok(())
}
