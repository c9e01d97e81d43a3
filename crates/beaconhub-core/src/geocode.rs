//! Country-code enrichment for receivers whose location is known but whose
//! cached country code is null (freshly created, or invalidated by a
//! position change during reconciliation).

use async_trait::async_trait;

use crate::error::CoreError;
use crate::store::SqliteBeaconStore;

/// Reverse-geocoding collaborator. Implementations return `Ok(None)` when
/// the position cannot be attributed to a country; that is a terminal
/// outcome for this pass, not an error.
#[async_trait]
pub trait CountryCodeResolver: Send + Sync {
    async fn country_code(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountryCodeReport {
    pub resolved: usize,
    pub unresolved: usize,
}

/// One enrichment pass. Lookup failures are logged and leave the column
/// null; the null condition persists, so the receiver is retried on the
/// next pass without any bookkeeping here.
///
/// Takes the store mutably so the returned future stays `Send`; a shared
/// reference to the underlying connection is not.
pub async fn update_country_codes(
    store: &mut SqliteBeaconStore,
    resolver: &dyn CountryCodeResolver,
) -> Result<CountryCodeReport, CoreError> {
    let mut report = CountryCodeReport::default();

    for receiver in store.receivers_missing_country_code()? {
        let (Some(latitude), Some(longitude)) = (receiver.latitude, receiver.longitude) else {
            continue;
        };

        match resolver.country_code(latitude, longitude).await {
            Ok(Some(country_code)) => {
                store.set_receiver_country_code(&receiver.name, &country_code)?;
                report.resolved += 1;
            }
            Ok(None) => {
                report.unresolved += 1;
            }
            Err(error) => {
                tracing::warn!(
                    receiver = %receiver.name,
                    error = %error,
                    "country code lookup failed; leaving null"
                );
                report.unresolved += 1;
            }
        }
    }

    Ok(report)
}
