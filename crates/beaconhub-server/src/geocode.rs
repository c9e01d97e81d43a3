//! Reverse geocoding against a Nominatim instance. Transport and decode
//! failures are logged and reported as "no country found" so the enrichment
//! pass retries the receiver later instead of aborting.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use beaconhub_config::GeocodeConfigToml;
use beaconhub_core::{CoreError, CountryCodeResolver};

pub struct NominatimResolver {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<ReverseAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    country_code: Option<String>,
}

impl NominatimResolver {
    pub fn new(config: &GeocodeConfigToml) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| {
                CoreError::Configuration(format!("failed to build geocoding client: {err}"))
            })?;

        Ok(Self {
            client,
            base_url: config.nominatim_base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl CountryCodeResolver for NominatimResolver {
    async fn country_code(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, CoreError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_owned()),
                ("zoom", "3".to_owned()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "nominatim request failed");
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "nominatim returned an error status");
            return Ok(None);
        }

        match response.json::<ReverseResponse>().await {
            Ok(body) => Ok(body
                .address
                .and_then(|address| address.country_code)
                .map(|code| code.to_lowercase())
                .filter(|code| !code.is_empty())),
            Err(err) => {
                tracing::warn!(error = %err, "nominatim response was not decodable");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_payload_decodes_country_code() {
        let raw = r#"{"place_id":42,"address":{"country":"Deutschland","country_code":"de"}}"#;
        let body: ReverseResponse = serde_json::from_str(raw).expect("decode");
        assert_eq!(
            body.address.and_then(|address| address.country_code),
            Some("de".to_owned())
        );
    }

    #[test]
    fn reverse_payload_without_address_decodes_to_none() {
        let raw = r#"{"error":"Unable to geocode"}"#;
        let body: ReverseResponse = serde_json::from_str(raw).expect("decode");
        assert!(body.address.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let config = GeocodeConfigToml {
            nominatim_base_url: "https://nominatim.example.org/".to_owned(),
            ..GeocodeConfigToml::default()
        };
        let resolver = NominatimResolver::new(&config).expect("build resolver");
        assert_eq!(resolver.base_url, "https://nominatim.example.org");
    }
}
