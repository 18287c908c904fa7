//! Prompt templates for the categorization and narrative completions.
//!
//! Plain `format!()` interpolation keeps missing variables a compile-time
//! error.

use std::collections::BTreeMap;

use crate::models::{AmenitySummary, CategorizedAmenities, Coordinates};

pub const NARRATIVE_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides detailed \
     information about locations and their nearby amenities.";

/// Prompt instructing the model to group amenities into at most 8
/// user-friendly categories and answer with nothing but a JSON object of
/// category label to amenity-name lists.
pub fn categorization_prompt(amenities: &[AmenitySummary]) -> String {
    let listing = amenities
        .iter()
        .map(|a| format!("- {} (Type: {})", a.name, a.amenity_type))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert at categorizing business amenities and services. Your task is to categorize the following amenities into logical, user-friendly categories.

Rules:
1. Group similar amenities together (e.g., all restaurants, cafes, fast food under "Dining")
2. Use clear, intuitive category names that users would understand
3. Aim for 6-8 main categories maximum
4. Consider both the amenity type and the business name when categorizing
5. Return ONLY a JSON object with categories as keys and lists of amenity names as values

Amenities to categorize:
{listing}

Return format:
{{
  "Dining": ["Restaurant Name 1", "Restaurant Name 2"],
  "Healthcare": ["Hospital Name", "Pharmacy Name"],
  "Education": ["School Name"]
}}

Important: Return ONLY the JSON object, no additional text or explanation."#
    )
}

/// Narrative prompt built from category counts. Much cheaper than listing
/// every amenity and the preferred path when categorization succeeded.
pub fn category_summary_prompt(
    address: &str,
    coordinates: &Coordinates,
    categorized: &CategorizedAmenities,
) -> String {
    let total: usize = categorized.values().map(Vec::len).sum();
    let summary = categorized
        .iter()
        .map(|(category, items)| format!("- **{category}**: {} locations", items.len()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Please provide a comprehensive analysis of the location and its nearby amenities.

**Location Details:**
- Address: {address}
- Coordinates: {latitude}, {longitude}
- Full Address: {full_address}

**Nearby Amenities Summary:**
Total amenities found: {total}

{summary}

**Analysis Request:**
Please provide insights about:
1. **Location Quality**: What makes this area attractive for living/working?
2. **Amenity Density**: How well-served is this location with essential services?
3. **Lifestyle Factors**: What type of lifestyle does this area support?
4. **Notable Features**: Any standout amenities or unique characteristics?
5. **Recommendations**: Who would benefit most from living/working here?

Please provide a detailed, well-structured analysis that would be helpful for someone considering this location."#,
        latitude = coordinates.latitude,
        longitude = coordinates.longitude,
        full_address = coordinates.address,
    )
}

/// Narrative prompt from raw amenity names grouped by top-level type, used
/// when no categorized mapping is available.
pub fn raw_amenities_prompt(
    address: &str,
    coordinates: &Coordinates,
    grouped: &BTreeMap<String, Vec<String>>,
) -> String {
    let listing = grouped
        .iter()
        .map(|(kind, names)| format!("- {}: {}", capitalize(kind), names.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Please provide a comprehensive analysis of the location and its nearby amenities.

**Location Details:**
- Address: {address}
- Coordinates: {latitude}, {longitude}
- Full Address: {full_address}

**Nearby Amenities Found:**
{listing}

**Please provide:**
1. A brief description of the location
2. Summary of available amenities by category
3. Notable highlights (e.g., major attractions, transportation, services)
4. Overall assessment of the area's convenience and livability
5. Any recommendations or insights about the location

Format your response in a clear, organized manner that would be helpful for someone considering this location."#,
        latitude = coordinates.latitude,
        longitude = coordinates.longitude,
        full_address = coordinates.address,
    )
}

/// Narrative prompt carrying only location facts, for when discovery found
/// nothing at all.
pub fn location_facts_prompt(address: &str, coordinates: &Coordinates) -> String {
    format!(
        r#"Please provide a brief analysis of the following location.

**Location Details:**
- Address: {address}
- Coordinates: {latitude}, {longitude}
- Full Address: {full_address}

No nearby amenities were found within the search radius. Describe what is known about the location itself and note that the immediate area has no recorded amenities."#,
        latitude = coordinates.latitude,
        longitude = coordinates.longitude,
        full_address = coordinates.address,
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
