//! Nearby points-of-interest discovery via Overpass-compatible endpoints.
//!
//! Two retry mechanisms compose here. Endpoint failover rotates a shared
//! cursor across the configured mirrors when one times out or answers with
//! an error status. Adaptive radius retry reduces an oversized search radius
//! to the floor once when the whole failover pass times out, then gives up.
//! Discovery never fails the pipeline: exhaustion yields an empty list.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{category, CacheService};
use crate::config::OverpassConfig;
use crate::error::{LocusError, Result};
use crate::models::{Amenity, Coordinates, LatLon};

/// Radius the adaptive retry falls back to. Never reduced below this.
const RADIUS_FLOOR: u32 = 1000;
/// Above this radius the query is narrowed to regex-batched selectors to
/// keep the interpreter within its time budget.
const REDUCED_QUERY_THRESHOLD: u32 = 3000;
/// Airports are sparse; search them in a proportionally larger circle.
const AIRPORT_RADIUS_FACTOR: u32 = 5;
const MOTORWAY_RADIUS_FACTOR: u32 = 2;

#[derive(Clone)]
pub struct AmenityFinder {
    http: reqwest::Client,
    endpoints: Vec<String>,
    cursor: Arc<AtomicUsize>,
    default_radius: u32,
    cache: CacheService,
}

#[derive(Serialize)]
struct AmenitiesKey {
    lat: f64,
    lon: f64,
    radius: u32,
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Failure modes of one failover pass.
enum QueryFailure {
    /// Client-side timeout or interpreter 504 on every endpoint tried.
    Timeout,
    /// Last endpoint answered with a non-success status.
    Status(u16),
    /// Non-timeout transport failure. Aborts the pass without rotating.
    Transport(String),
}

impl AmenityFinder {
    pub fn new(config: &OverpassConfig, cache: CacheService) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(LocusError::Internal(
                "At least one Overpass endpoint is required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LocusError::Internal(format!("Failed to build Overpass client: {e}")))?;

        Ok(Self {
            http,
            endpoints: config.endpoints.clone(),
            cursor: Arc::new(AtomicUsize::new(0)),
            default_radius: config.default_radius,
            cache,
        })
    }

    pub fn default_radius(&self) -> u32 {
        self.default_radius
    }

    /// Discover amenities around `coordinates`. The radius starts at the
    /// caller's value (or the default) and is reduced to the floor at most
    /// once when the upstream times out, so the loop always terminates.
    pub async fn find_nearby(&self, coordinates: &Coordinates, radius: Option<u32>) -> Vec<Amenity> {
        let mut radius = radius.unwrap_or(self.default_radius);

        loop {
            let key = AmenitiesKey {
                lat: coordinates.latitude,
                lon: coordinates.longitude,
                radius,
            };

            if let Some(cached) = self.cache.get::<Vec<Amenity>, _>(category::AMENITIES, &key).await
            {
                tracing::debug!(radius, "Amenities cache hit");
                return cached;
            }

            let query = build_query(coordinates.latitude, coordinates.longitude, radius);

            match self.post_with_failover(&query).await {
                Ok(response) => {
                    let amenities = parse_amenities(response.elements, coordinates);
                    tracing::info!(radius, count = amenities.len(), "Amenity discovery complete");
                    self.cache.set(category::AMENITIES, &key, &amenities).await;
                    return amenities;
                }
                Err(QueryFailure::Timeout) if radius > RADIUS_FLOOR => {
                    tracing::warn!(radius, "Overpass timed out, retrying at the floor radius");
                    radius = RADIUS_FLOOR;
                }
                Err(QueryFailure::Timeout) => {
                    tracing::warn!(radius, "Overpass timed out at the floor radius, giving up");
                    return Vec::new();
                }
                Err(QueryFailure::Status(status)) => {
                    tracing::warn!(radius, status, "Overpass returned an error status");
                    return Vec::new();
                }
                Err(QueryFailure::Transport(message)) => {
                    tracing::warn!(radius, error = %message, "Overpass request failed");
                    return Vec::new();
                }
            }
        }
    }

    /// POST the query to each endpoint in rotation, at most one full pass.
    /// The cursor advances on timeout and on error status so subsequent
    /// requests start at the endpoint that last worked. A non-timeout
    /// transport error aborts the pass without rotating.
    async fn post_with_failover(&self, query: &str) -> std::result::Result<OverpassResponse, QueryFailure> {
        let mut last_failure = QueryFailure::Timeout;

        for _ in 0..self.endpoints.len() {
            let index = self.cursor.load(Ordering::Relaxed) % self.endpoints.len();
            let endpoint = &self.endpoints[index];
            tracing::debug!(%endpoint, "Querying Overpass endpoint");

            let response = self
                .http
                .post(endpoint)
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(query.to_string())
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<OverpassResponse>()
                        .await
                        .map_err(|e| QueryFailure::Transport(e.to_string()));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    tracing::warn!(%endpoint, status, "Overpass endpoint answered with an error");
                    self.cursor.fetch_add(1, Ordering::Relaxed);
                    last_failure = if status == 504 {
                        QueryFailure::Timeout
                    } else {
                        QueryFailure::Status(status)
                    };
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(%endpoint, "Overpass endpoint timed out");
                    self.cursor.fetch_add(1, Ordering::Relaxed);
                    last_failure = QueryFailure::Timeout;
                }
                Err(e) => return Err(QueryFailure::Transport(e.to_string())),
            }
        }

        Err(last_failure)
    }
}

/// Render the Overpass QL query for one search circle. Above the reduced
/// threshold the selectors are regex-batched and ways are dropped to keep
/// the interpreter fast.
fn build_query(lat: f64, lon: f64, radius: u32) -> String {
    if radius > REDUCED_QUERY_THRESHOLD {
        return format!(
            r#"[out:json];
(
  node["amenity"~"^(school|hospital|restaurant|fuel|bank|pharmacy)$"](around:{radius},{lat},{lon});
  node["leisure"="park"](around:{radius},{lat},{lon});
  node["shop"~"^(supermarket|mall)$"](around:{radius},{lat},{lon});
);
out body;
"#
        );
    }

    let airport_radius = radius * AIRPORT_RADIUS_FACTOR;
    let motorway_radius = radius * MOTORWAY_RADIUS_FACTOR;
    format!(
        r#"[out:json];
(
  node["amenity"="school"](around:{radius},{lat},{lon});
  node["amenity"="hospital"](around:{radius},{lat},{lon});
  node["amenity"="restaurant"](around:{radius},{lat},{lon});
  node["amenity"="fuel"](around:{radius},{lat},{lon});
  node["amenity"="bank"](around:{radius},{lat},{lon});
  node["amenity"="pharmacy"](around:{radius},{lat},{lon});
  node["leisure"="park"](around:{radius},{lat},{lon});
  node["leisure"="pitch"]["sport"="basketball"](around:{radius},{lat},{lon});
  node["leisure"="pitch"]["sport"="tennis"](around:{radius},{lat},{lon});
  node["leisure"="pitch"]["sport"="soccer"](around:{radius},{lat},{lon});
  node["aeroway"="aerodrome"](around:{airport_radius},{lat},{lon});
  way["highway"="motorway"](around:{motorway_radius},{lat},{lon});
  way["highway"="primary"](around:{radius},{lat},{lon});
  node["shop"="supermarket"](around:{radius},{lat},{lon});
  node["shop"="mall"](around:{radius},{lat},{lon});
);
out body;
"#
    )
}

/// Turn raw elements into deduplicated amenities. First occurrence of each
/// case-insensitive trimmed name wins; later duplicates are dropped
/// regardless of type.
fn parse_amenities(elements: Vec<OverpassElement>, origin: &Coordinates) -> Vec<Amenity> {
    let mut amenities = Vec::new();
    let mut seen_names = HashSet::new();

    for element in elements {
        let amenity_type = tag_path(&element.tags);
        let Some(name) = display_name(&element.tags, &amenity_type) else {
            continue;
        };

        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() || !seen_names.insert(normalized) {
            continue;
        }

        let coordinates = match (element.lat, element.lon) {
            (Some(lat), Some(lon)) => Some(LatLon { lat, lon }),
            _ => None,
        };
        let distance = coordinates.map(|point| {
            haversine_meters(origin.latitude, origin.longitude, point.lat, point.lon)
        });

        amenities.push(Amenity {
            name,
            amenity_type,
            distance,
            coordinates,
        });
    }

    amenities
}

/// Tag-path encoding of an element's kind, by tag precedence. A leisure
/// pitch carries its sport as a third segment.
fn tag_path(tags: &HashMap<String, String>) -> String {
    if let Some(amenity) = tags.get("amenity") {
        format!("amenity:{amenity}")
    } else if let Some(leisure) = tags.get("leisure") {
        match tags.get("sport") {
            Some(sport) => format!("leisure:{leisure}:{sport}"),
            None => format!("leisure:{leisure}"),
        }
    } else if let Some(aeroway) = tags.get("aeroway") {
        format!("aeroway:{aeroway}")
    } else if let Some(highway) = tags.get("highway") {
        format!("highway:{highway}")
    } else if let Some(shop) = tags.get("shop") {
        format!("shop:{shop}")
    } else {
        "unknown".to_string()
    }
}

/// Name precedence: name tag, then brand, then operator, then a title-cased
/// rendering of the tag path.
fn display_name(tags: &HashMap<String, String>, amenity_type: &str) -> Option<String> {
    for field in ["name", "brand", "operator"] {
        if let Some(value) = tags.get(field) {
            if !value.trim().is_empty() {
                return Some(value.clone());
            }
        }
    }
    Some(title_case(amenity_type))
}

fn title_case(path: &str) -> String {
    path.split(':')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Great-circle distance in meters.
fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}
