//! Amenity categorization: LLM-driven with a rule-based fallback.
//!
//! The LLM path asks for a JSON object of category label to amenity names
//! and re-attaches the names to the caller's amenities by exact match. Any
//! failure along that path (call, parse, shape) degrades to the keyword
//! rules, which always succeed. Only LLM-produced mappings are cached; the
//! rules are cheaper than a cache lookup.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::{category, CacheService};
use crate::llm::{prompts, CompletionOptions, LlmProvider};
use crate::models::{AmenitySummary, CategorizedAmenities};

/// Above this many amenities the LLM is skipped outright and the rules run
/// in batches.
const LLM_INPUT_LIMIT: usize = 1000;
const BATCH_SIZE: usize = 500;

const FALLBACK_CATEGORY: &str = "Other";

/// Keyword rules, checked in order; the first match wins. Each entry is
/// (category, type keywords, name keywords) matched as lowercase substrings
/// against the type's suffix past the first `:` and the amenity name.
const RULES: &[(&str, &[&str], &[&str])] = &[
    (
        "Dining",
        &["restaurant", "cafe", "fast_food", "food_court"],
        &["restaurant", "cafe", "pizza", "burger", "sushi", "thai", "chinese", "mexican", "italian"],
    ),
    (
        "Education",
        &["school", "university", "college"],
        &["school", "university", "college", "academy"],
    ),
    (
        "Healthcare",
        &["hospital", "pharmacy", "clinic", "dentist"],
        &["hospital", "pharmacy", "clinic", "medical", "health"],
    ),
    (
        "Banking",
        &["bank", "atm", "bureau_de_change"],
        &["bank", "credit union", "atm"],
    ),
    (
        "Shopping",
        &["supermarket", "convenience", "mall", "shop"],
        &["market", "store", "shop", "mall", "grocery"],
    ),
    (
        "Automotive",
        &["fuel", "car_wash", "garage"],
        &["gas", "fuel", "shell", "chevron", "arco"],
    ),
    (
        "Recreation",
        &["park", "playground", "sports_centre", "pitch"],
        &["park", "playground", "sports", "recreation"],
    ),
    ("Transportation", &["highway", "motorway", "primary"], &[]),
];

#[derive(Clone)]
pub struct Categorizer {
    llm: LlmProvider,
    cache: CacheService,
}

#[derive(Serialize)]
struct CategorizationKey<'a> {
    amenities: &'a [AmenitySummary],
}

impl Categorizer {
    pub fn new(llm: LlmProvider, cache: CacheService) -> Self {
        Self { llm, cache }
    }

    /// Categorize amenities. Infallible: every input ends up in exactly one
    /// category of the result, under an LLM label or a rule label, with
    /// "Other" as the last resort.
    pub async fn categorize(&self, amenities: &[AmenitySummary]) -> CategorizedAmenities {
        if amenities.is_empty() {
            return CategorizedAmenities::new();
        }

        let key = CategorizationKey { amenities };
        if let Some(cached) = self
            .cache
            .get::<CategorizedAmenities, _>(category::CATEGORIZATION, &key)
            .await
        {
            tracing::debug!("Categorization cache hit");
            return cached;
        }

        // Only the LLM path below writes the cache, so the batch path
        // always arrives here on a miss.
        if amenities.len() > LLM_INPUT_LIMIT {
            tracing::info!(
                count = amenities.len(),
                "Too many amenities for the LLM, using batched rules"
            );
            return rule_based_batched(amenities);
        }

        match self.categorize_with_llm(amenities).await {
            Some(categorized) => {
                self.cache.set(category::CATEGORIZATION, &key, &categorized).await;
                categorized
            }
            None => rule_based(amenities),
        }
    }

    async fn categorize_with_llm(&self, amenities: &[AmenitySummary]) -> Option<CategorizedAmenities> {
        let prompt = prompts::categorization_prompt(amenities);
        let options = CompletionOptions {
            temperature: Some(0.3),
            ..Default::default()
        };

        let response = match self.llm.complete(&prompt, None, Some(&options)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "LLM categorization failed, using rules");
                return None;
            }
        };

        let Some(mapping) = parse_category_map(&response) else {
            tracing::warn!("LLM categorization response was not a category map, using rules");
            return None;
        };

        Some(attach_by_exact_name(&mapping, amenities))
    }
}

/// Strip a Markdown code fence around the payload, if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Parse the LLM response as `{category: [names]}`. Shape-only validation:
/// any JSON object whose values are string arrays passes.
fn parse_category_map(response: &str) -> Option<BTreeMap<String, Vec<String>>> {
    serde_json::from_str(strip_code_fences(response)).ok()
}

/// Re-attach LLM-listed names to the caller's amenities. For each listed
/// name the first amenity with an exactly equal name is taken; names the
/// model invented are dropped, and a category whose names all drop is still
/// present as an empty list.
fn attach_by_exact_name(
    mapping: &BTreeMap<String, Vec<String>>,
    amenities: &[AmenitySummary],
) -> CategorizedAmenities {
    let mut categorized = CategorizedAmenities::new();

    for (label, names) in mapping {
        let entries = categorized.entry(label.clone()).or_default();
        for name in names {
            if let Some(amenity) = amenities.iter().find(|a| &a.name == name) {
                entries.push(amenity.clone());
            }
        }
    }

    categorized
}

/// Rule-based category for one amenity.
fn classify(amenity: &AmenitySummary) -> &'static str {
    let type_suffix = amenity
        .amenity_type
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(&amenity.amenity_type)
        .to_lowercase();
    let name = amenity.name.to_lowercase();

    for (label, type_keywords, name_keywords) in RULES {
        let type_hit = type_keywords.iter().any(|kw| type_suffix.contains(kw));
        let name_hit = name_keywords.iter().any(|kw| name.contains(kw));
        if type_hit || name_hit {
            return label;
        }
    }

    FALLBACK_CATEGORY
}

pub fn rule_based(amenities: &[AmenitySummary]) -> CategorizedAmenities {
    let mut categorized = CategorizedAmenities::new();
    for amenity in amenities {
        categorized
            .entry(classify(amenity).to_string())
            .or_default()
            .push(amenity.clone());
    }
    categorized
}

fn rule_based_batched(amenities: &[AmenitySummary]) -> CategorizedAmenities {
    let mut categorized = CategorizedAmenities::new();
    for batch in amenities.chunks(BATCH_SIZE) {
        let mut partial = rule_based(batch);
        for (label, mut entries) in std::mem::take(&mut partial) {
            categorized.entry(label).or_default().append(&mut entries);
        }
    }
    categorized
}
