use axum::Json;
use utoipa::OpenApi;

use super::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Locus API",
        version = "1.0.0",
        description = "Address intelligence service: geocoding, nearby amenity discovery and AI-generated location analysis.",
    ),
    paths(
        handlers::process_address,
        handlers::categorize,
        handlers::health_check,
        handlers::amenity_types,
    ),
    components(schemas(
        handlers::AddressRequest,
        handlers::CategorizeRequest,
        handlers::CategorizeResponse,
        handlers::HealthData,
        handlers::CacheStatus,
        handlers::LlmStatus,
        handlers::UpstreamStatus,
        models::AddressReport,
        models::Amenity,
        models::AmenitySummary,
        models::Coordinates,
        models::LatLon,
    ))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
