//! Forward geocoding against a Nominatim-compatible endpoint.
//!
//! Absence of coordinates is an expected outcome, not a fault, so the lookup
//! returns `Option` rather than `Result`: provider downtime, malformed
//! responses and unknown addresses all collapse to `None` and are logged.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{category, CacheService};
use crate::config::GeocodingConfig;
use crate::error::{LocusError, Result};
use crate::models::Coordinates;

#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    base_url: String,
    country_codes: String,
    request_spacing: Duration,
    cache: CacheService,
}

#[derive(Serialize)]
struct GeocodeKey<'a> {
    address: &'a str,
}

/// One candidate in a Nominatim search response. The provider serializes
/// lat/lon as strings.
#[derive(Deserialize)]
struct GeocodeCandidate {
    lat: String,
    lon: String,
    display_name: String,
}

impl Geocoder {
    pub fn new(config: &GeocodingConfig, cache: CacheService) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LocusError::Internal(format!("Failed to build geocoding client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            country_codes: config.country_codes.clone(),
            request_spacing: Duration::from_millis(config.request_spacing_ms),
            cache,
        })
    }

    /// Resolve a free-form address to coordinates. Cached hits skip the
    /// provider entirely and pay no rate-limit delay.
    pub async fn geocode(&self, address: &str) -> Option<Coordinates> {
        let key = GeocodeKey { address };

        if let Some(cached) = self.cache.get::<Coordinates, _>(category::GEOCODING, &key).await {
            tracing::debug!(%address, "Geocoding cache hit");
            return Some(cached);
        }

        let candidate = self.fetch(address).await?;

        let (Ok(latitude), Ok(longitude)) =
            (candidate.lat.parse::<f64>(), candidate.lon.parse::<f64>())
        else {
            tracing::warn!(
                %address,
                lat = %candidate.lat,
                lon = %candidate.lon,
                "Geocoding returned unparseable coordinates"
            );
            return None;
        };

        let coordinates = Coordinates {
            latitude,
            longitude,
            address: candidate.display_name,
        };

        self.cache.set(category::GEOCODING, &key, &coordinates).await;

        Some(coordinates)
    }

    /// Issue the provider request and return the top candidate. The
    /// rate-limit spacing is paid after every outbound request, hit or miss,
    /// success or failure.
    async fn fetch(&self, address: &str) -> Option<GeocodeCandidate> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", address),
                ("format", "json"),
                ("countrycodes", &self.country_codes),
                ("limit", "1"),
            ])
            .send()
            .await;

        tokio::time::sleep(self.request_spacing).await;

        let candidates: Vec<GeocodeCandidate> = match response
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => match response.json().await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(%address, error = %e, "Geocoding response was not valid JSON");
                    return None;
                }
            },
            Err(e) => {
                tracing::warn!(%address, error = %e, "Geocoding request failed");
                return None;
            }
        };

        if candidates.is_empty() {
            tracing::info!(%address, "No geocoding results");
            return None;
        }

        candidates.into_iter().next()
    }
}
