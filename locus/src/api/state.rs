use std::sync::Arc;

use crate::amenities::AmenityFinder;
use crate::cache::CacheService;
use crate::categorize::Categorizer;
use crate::config::Config;
use crate::error::Result;
use crate::geocode::Geocoder;
use crate::llm::LlmProvider;
use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: CacheService,
    pub llm: LlmProvider,
    pub categorizer: Categorizer,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(config: Config, cache: CacheService, llm: LlmProvider) -> Result<Self> {
        let geocoder = Geocoder::new(&config.geocoding, cache.clone())?;
        let amenities = AmenityFinder::new(&config.overpass, cache.clone())?;
        let categorizer = Categorizer::new(llm.clone(), cache.clone());
        let pipeline = Pipeline::new(geocoder, amenities, categorizer.clone(), llm.clone());

        Ok(Self {
            config: Arc::new(config),
            cache,
            llm,
            categorizer,
            pipeline,
        })
    }
}
