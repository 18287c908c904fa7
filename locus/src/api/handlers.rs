use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::state::AppState;
use crate::error::{LocusError, Result};
use crate::models::{AddressReport, AmenitySummary, CategorizedAmenities};

pub const MIN_RADIUS: u32 = 100;
pub const MAX_RADIUS: u32 = 10_000;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AddressRequest {
    /// Free-form US postal address.
    pub address: String,
    /// Search radius in meters, 100-10000. Defaults to the configured value.
    pub radius: Option<u32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CategorizeRequest {
    pub amenities: Vec<AmenitySummary>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CategorizeResponse {
    pub categorized_amenities: CategorizedAmenities,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub cache: CacheStatus,
    pub llm: LlmStatus,
    pub upstreams: UpstreamStatus,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CacheStatus {
    pub backend: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LlmStatus {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UpstreamStatus {
    pub geocoding: String,
    pub overpass_endpoints: usize,
}

/// `POST /process-address`
#[utoipa::path(
    post,
    path = "/process-address",
    tag = "pipeline",
    request_body = AddressRequest,
    responses(
        (status = 200, description = "Pipeline report for the address", body = AddressReport),
        (status = 400, description = "Invalid address or radius"),
    )
)]
pub async fn process_address(
    State(state): State<AppState>,
    Json(request): Json<AddressRequest>,
) -> Result<Json<AddressReport>> {
    let address = request.address.trim();
    if address.is_empty() {
        return Err(LocusError::Validation("Address cannot be empty".to_string()));
    }

    if let Some(radius) = request.radius {
        if !(MIN_RADIUS..=MAX_RADIUS).contains(&radius) {
            return Err(LocusError::Validation(format!(
                "Radius must be between {MIN_RADIUS} and {MAX_RADIUS} meters"
            )));
        }
    }

    let report = state.pipeline.process_address(address, request.radius).await;
    Ok(Json(report))
}

/// `POST /categorize`
#[utoipa::path(
    post,
    path = "/categorize",
    tag = "pipeline",
    request_body = CategorizeRequest,
    responses(
        (status = 200, description = "Amenities grouped by category", body = CategorizeResponse),
    )
)]
pub async fn categorize(
    State(state): State<AppState>,
    Json(request): Json<CategorizeRequest>,
) -> Json<CategorizeResponse> {
    let categorized = state.categorizer.categorize(&request.amenities).await;
    Json(CategorizeResponse {
        categorized_amenities: categorized,
    })
}

/// `GET /health`
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthData> {
    Json(HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: CacheStatus {
            backend: state.cache.backend_name().to_string(),
        },
        llm: LlmStatus {
            provider: state.llm.backend().name().to_string(),
            model: state.llm.model().to_string(),
        },
        upstreams: UpstreamStatus {
            geocoding: state.config.geocoding.base_url.clone(),
            overpass_endpoints: state.config.overpass.endpoints.len(),
        },
    })
}

/// `GET /amenity-types`
#[utoipa::path(
    get,
    path = "/amenity-types",
    tag = "pipeline",
    responses(
        (status = 200, description = "Supported amenity types and radius bounds"),
    )
)]
pub async fn amenity_types(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "amenity_types": {
            "education": ["school", "university", "college"],
            "healthcare": ["hospital", "clinic", "pharmacy"],
            "food": ["restaurant", "cafe", "fast_food"],
            "shopping": ["supermarket", "mall", "shop"],
            "recreation": ["park", "pitch", "sports_centre"],
            "transportation": ["fuel", "aerodrome", "motorway"],
            "services": ["bank", "atm", "post_office"]
        },
        "default_radius": state.config.overpass.default_radius,
        "min_radius": MIN_RADIUS,
        "max_radius": MAX_RADIUS,
    }))
}
