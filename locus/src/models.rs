use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A geocoded location. Immutable once produced; owned by the pipeline state
/// for the duration of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Normalized display form of the address as returned by the provider.
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// A discovered point/way of interest. `amenity_type` is a tag-path encoding
/// such as `"amenity:hospital"` or `"leisure:pitch:tennis"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Amenity {
    pub name: String,
    pub amenity_type: String,
    /// Meters from the query point, when the element carried coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<LatLon>,
}

impl Amenity {
    pub fn summary(&self) -> AmenitySummary {
        AmenitySummary {
            name: self.name.clone(),
            amenity_type: self.amenity_type.clone(),
        }
    }
}

/// The name/type projection of an amenity used for categorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AmenitySummary {
    pub name: String,
    pub amenity_type: String,
}

/// Open string-keyed category mapping. Labels are model- or rule-determined;
/// there is deliberately no closed enumeration of them.
pub type CategorizedAmenities = BTreeMap<String, Vec<AmenitySummary>>;

/// Request-scoped aggregate mutated in place by each pipeline step and
/// discarded at request end. `error` is sticky: once set, downstream steps
/// short-circuit and the error propagates to the final report.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub address: String,
    pub radius: Option<u32>,
    pub coordinates: Option<Coordinates>,
    pub amenities: Vec<Amenity>,
    pub categorized_amenities: Option<CategorizedAmenities>,
    pub narrative: Option<String>,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(address: &str, radius: Option<u32>) -> Self {
        Self {
            address: address.to_string(),
            radius,
            ..Default::default()
        }
    }

    /// Record a failure without clobbering an earlier one.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }
}

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AddressReport {
    pub success: bool,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub amenities: Vec<Amenity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorized_amenities: Option<CategorizedAmenities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub radius_used: u32,
}
