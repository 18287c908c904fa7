//! The three-stage address pipeline.
//!
//! Geocoding is the only stage that can fail the request: without
//! coordinates there is nothing to discover. Every later stage degrades
//! instead, so a report with `success: true` may still carry an empty
//! amenity list or a counts-only fallback narrative.

use std::collections::BTreeMap;

use crate::amenities::AmenityFinder;
use crate::categorize::Categorizer;
use crate::geocode::Geocoder;
use crate::llm::{prompts, CompletionOptions, LlmProvider};
use crate::models::{AddressReport, AmenitySummary, CategorizedAmenities, Coordinates, PipelineState};

/// Cap on raw amenities fed into the narrative prompt when no categorized
/// mapping is available.
const PROMPT_AMENITY_CAP: usize = 100;

#[derive(Clone)]
pub struct Pipeline {
    geocoder: Geocoder,
    amenities: AmenityFinder,
    categorizer: Categorizer,
    llm: LlmProvider,
}

impl Pipeline {
    pub fn new(
        geocoder: Geocoder,
        amenities: AmenityFinder,
        categorizer: Categorizer,
        llm: LlmProvider,
    ) -> Self {
        Self {
            geocoder,
            amenities,
            categorizer,
            llm,
        }
    }

    /// Run the full pipeline for one address.
    pub async fn process_address(&self, address: &str, radius: Option<u32>) -> AddressReport {
        let mut state = PipelineState::new(address, radius);
        tracing::info!(%address, ?radius, "Pipeline started");

        self.geocode_step(&mut state).await;
        self.discover_and_categorize_step(&mut state).await;
        self.synthesize_step(&mut state).await;

        self.finish(state)
    }

    async fn geocode_step(&self, state: &mut PipelineState) {
        match self.geocoder.geocode(&state.address).await {
            Some(coordinates) => {
                tracing::info!(
                    latitude = coordinates.latitude,
                    longitude = coordinates.longitude,
                    "Address geocoded"
                );
                state.coordinates = Some(coordinates);
            }
            None => state.fail(format!("no coordinates for address: {}", state.address)),
        }
    }

    async fn discover_and_categorize_step(&self, state: &mut PipelineState) {
        if state.error.is_some() {
            return;
        }
        let Some(coordinates) = state.coordinates.clone() else {
            return;
        };

        let amenities = self.amenities.find_nearby(&coordinates, state.radius).await;

        if amenities.is_empty() {
            state.amenities = Vec::new();
            state.categorized_amenities = Some(CategorizedAmenities::new());
            return;
        }

        let summaries: Vec<AmenitySummary> = amenities.iter().map(|a| a.summary()).collect();
        let categorized = self.categorizer.categorize(&summaries).await;

        tracing::info!(
            amenities = amenities.len(),
            categories = categorized.len(),
            "Discovery and categorization complete"
        );

        state.amenities = amenities;
        state.categorized_amenities = Some(categorized);
    }

    async fn synthesize_step(&self, state: &mut PipelineState) {
        if state.error.is_some() {
            return;
        }
        let Some(coordinates) = state.coordinates.clone() else {
            return;
        };

        let categorized = state.categorized_amenities.clone().unwrap_or_default();
        let prompt = if !categorized.is_empty() {
            prompts::category_summary_prompt(&state.address, &coordinates, &categorized)
        } else if !state.amenities.is_empty() {
            let grouped = group_by_top_level_type(&state.amenities, PROMPT_AMENITY_CAP);
            prompts::raw_amenities_prompt(&state.address, &coordinates, &grouped)
        } else {
            prompts::location_facts_prompt(&state.address, &coordinates)
        };

        let options = CompletionOptions {
            temperature: Some(0.7),
            ..Default::default()
        };

        match self
            .llm
            .complete(&prompt, Some(prompts::NARRATIVE_SYSTEM_PROMPT), Some(&options))
            .await
        {
            Ok(narrative) => state.narrative = Some(narrative),
            Err(e) => {
                tracing::warn!(error = %e, "Narrative synthesis failed, using fallback report");
                state.narrative = Some(fallback_report(&state.address, &coordinates, &categorized));
            }
        }
    }

    fn finish(&self, state: PipelineState) -> AddressReport {
        let success = state.error.is_none();
        AddressReport {
            success,
            address: state.address,
            coordinates: state.coordinates,
            amenities: state.amenities,
            categorized_amenities: state.categorized_amenities,
            narrative: state.narrative,
            error: state.error,
            radius_used: state.radius.unwrap_or(self.amenities.default_radius()),
        }
    }
}

/// Group amenity names by the first segment of their tag path, keeping at
/// most `cap` amenities in discovery order.
fn group_by_top_level_type(
    amenities: &[crate::models::Amenity],
    cap: usize,
) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for amenity in amenities.iter().take(cap) {
        let kind = amenity
            .amenity_type
            .split(':')
            .next()
            .unwrap_or("unknown")
            .to_string();
        grouped.entry(kind).or_default().push(amenity.name.clone());
    }
    grouped
}

/// Counts-only report used when the narrative completion fails. States what
/// was found and nothing more.
fn fallback_report(
    address: &str,
    coordinates: &Coordinates,
    categorized: &CategorizedAmenities,
) -> String {
    if categorized.is_empty() {
        return format!(
            "## Location Analysis\n\n**Address:** {address}\n**Coordinates:** {}, {}\n\n*Analysis unavailable.*",
            coordinates.latitude, coordinates.longitude
        );
    }

    let total: usize = categorized.values().map(Vec::len).sum();
    let mut report = format!(
        "## Location Analysis\n\n**Address:** {address}\n**Coordinates:** {}, {}\n**Full Address:** {}\n\n### Amenity Summary\nTotal amenities found: {total}\n\n",
        coordinates.latitude, coordinates.longitude, coordinates.address
    );

    for (category, items) in categorized {
        report.push_str(&format!("**{category}:** {} locations\n", items.len()));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amenity, LatLon};

    fn coordinates() -> Coordinates {
        Coordinates {
            latitude: 37.4224,
            longitude: -122.0842,
            address: "Mountain View, CA".to_string(),
        }
    }

    fn amenity(name: &str, amenity_type: &str) -> Amenity {
        Amenity {
            name: name.to_string(),
            amenity_type: amenity_type.to_string(),
            distance: Some(120.0),
            coordinates: Some(LatLon {
                lat: 37.42,
                lon: -122.08,
            }),
        }
    }

    #[test]
    fn grouping_caps_and_splits_on_top_level_tag() {
        let amenities: Vec<Amenity> = (0..150)
            .map(|i| {
                if i % 2 == 0 {
                    amenity(&format!("Cafe {i}"), "amenity:cafe")
                } else {
                    amenity(&format!("Park {i}"), "leisure:park")
                }
            })
            .collect();

        let grouped = group_by_top_level_type(&amenities, 100);
        let total: usize = grouped.values().map(Vec::len).sum();
        assert_eq!(total, 100);
        assert_eq!(grouped["amenity"].len(), 50);
        assert_eq!(grouped["leisure"].len(), 50);
        assert_eq!(grouped["amenity"][0], "Cafe 0");
    }

    #[test]
    fn fallback_report_states_counts_only() {
        let mut categorized = CategorizedAmenities::new();
        categorized.insert(
            "Dining".to_string(),
            vec![AmenitySummary {
                name: "Starbucks".to_string(),
                amenity_type: "amenity:cafe".to_string(),
            }],
        );

        let report = fallback_report("123 Main St", &coordinates(), &categorized);
        assert!(report.contains("## Location Analysis"));
        assert!(report.contains("Total amenities found: 1"));
        assert!(report.contains("**Dining:** 1 locations"));
        assert!(!report.contains("well-served"));
    }

    #[test]
    fn fallback_report_without_categories_is_short() {
        let report = fallback_report("123 Main St", &coordinates(), &CategorizedAmenities::new());
        assert!(report.contains("*Analysis unavailable.*"));
        assert!(!report.contains("Amenity Summary"));
    }
}
