use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse `OVERPASS_ENDPOINTS` env var: comma-separated interpreter URLs.
/// Empty entries are skipped; an empty or missing var yields the defaults.
fn parse_endpoints() -> Vec<String> {
    match env::var("OVERPASS_ENDPOINTS") {
        Ok(val) if !val.trim().is_empty() => val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => vec![
            "https://overpass-api.de/api/interpreter".to_string(),
            "https://lz4.overpass-api.de/api/interpreter".to_string(),
            "https://z.overpass-api.de/api/interpreter".to_string(),
        ],
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub geocoding: GeocodingConfig,
    pub overpass: OverpassConfig,
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
}

/// Forward-geocoding provider settings (Nominatim-compatible).
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub user_agent: String,
    pub country_codes: String,
    /// Mandatory spacing between outbound requests, paid as a fixed
    /// post-call delay. The public Nominatim instance requires 1s.
    pub request_spacing_ms: u64,
    pub timeout_secs: u64,
}

/// POI provider settings (Overpass-compatible).
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassConfig {
    pub endpoints: Vec<String>,
    pub timeout_secs: u64,
    pub default_radius: u32,
}

/// LLM configuration for the categorization and narrative completions.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("LOCUS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("LOCUS_PORT", 8000),
            },
            cache: CacheConfig {
                redis_url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            geocoding: GeocodingConfig {
                base_url: env::var("GEOCODING_BASE_URL")
                    .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/search".to_string()),
                user_agent: env::var("LOCUS_USER_AGENT")
                    .unwrap_or_else(|_| format!("locus/{}", env!("CARGO_PKG_VERSION"))),
                country_codes: env::var("GEOCODING_COUNTRY_CODES")
                    .unwrap_or_else(|_| "us".to_string()),
                request_spacing_ms: parse_env_or("GEOCODING_REQUEST_SPACING_MS", 1000),
                timeout_secs: parse_env_or("GEOCODING_TIMEOUT", 10),
            },
            overpass: OverpassConfig {
                endpoints: parse_endpoints(),
                timeout_secs: parse_env_or("OVERPASS_TIMEOUT", 30),
                default_radius: parse_env_or("DEFAULT_SEARCH_RADIUS", 1000),
            },
            llm: env::var("LLM_MODEL").ok().map(|model| LlmConfig {
                model,
                api_key: env::var("LLM_API_KEY").ok(),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 30),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 3),
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known LLM providers that use OpenAI-compatible APIs.
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse an LLM model name into a (provider, model) tuple.
pub fn parse_llm_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_LLM_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Unknown prefix: treat the whole string as a custom model name
    ("custom", model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::remove_var("LOCUS_HOST");
        std::env::remove_var("LOCUS_PORT");

        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_geocoding_defaults() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::remove_var("GEOCODING_BASE_URL");
        std::env::remove_var("GEOCODING_COUNTRY_CODES");
        std::env::remove_var("GEOCODING_REQUEST_SPACING_MS");

        let config = Config::default();
        assert_eq!(
            config.geocoding.base_url,
            "https://nominatim.openstreetmap.org/search"
        );
        assert_eq!(config.geocoding.country_codes, "us");
        assert_eq!(config.geocoding.request_spacing_ms, 1000);
    }

    #[test]
    fn test_overpass_default_endpoints() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::remove_var("OVERPASS_ENDPOINTS");
        std::env::remove_var("DEFAULT_SEARCH_RADIUS");

        let config = Config::default();
        assert_eq!(config.overpass.endpoints.len(), 3);
        assert_eq!(config.overpass.default_radius, 1000);
    }

    #[test]
    fn test_overpass_endpoints_from_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::set_var(
            "OVERPASS_ENDPOINTS",
            "http://one.example/api, http://two.example/api,",
        );

        let config = Config::default();
        assert_eq!(
            config.overpass.endpoints,
            vec![
                "http://one.example/api".to_string(),
                "http://two.example/api".to_string()
            ]
        );

        std::env::remove_var("OVERPASS_ENDPOINTS");
    }

    #[test]
    fn test_llm_config_absent_without_model() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::remove_var("LLM_MODEL");

        let config = Config::default();
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_llm_config_from_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::set_var("LLM_MODEL", "openai/gpt-4o-mini");
        std::env::set_var("LLM_API_KEY", "test-key");

        let config = Config::default();
        let llm = config.llm.expect("llm config should be present");
        assert_eq!(llm.model, "openai/gpt-4o-mini");
        assert_eq!(llm.api_key.as_deref(), Some("test-key"));
        assert_eq!(llm.timeout_secs, 30);
        assert_eq!(llm.max_retries, 3);

        std::env::remove_var("LLM_MODEL");
        std::env::remove_var("LLM_API_KEY");
    }

    #[test]
    fn test_parse_llm_provider_model() {
        assert_eq!(
            parse_llm_provider_model("openai/gpt-4o-mini"),
            ("openai", "gpt-4o-mini")
        );
        assert_eq!(
            parse_llm_provider_model("openrouter/openai/gpt-4o"),
            ("openrouter", "openai/gpt-4o")
        );
        assert_eq!(
            parse_llm_provider_model("my-local-model"),
            ("custom", "my-local-model")
        );
    }
}
