use std::sync::Arc;

use crate::config::{parse_llm_provider_model, LlmConfig};
use crate::error::{LocusError, Result};
use crate::llm::api::LlmApiClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
}

impl LlmBackend {
    pub fn name(&self) -> &'static str {
        match self {
            LlmBackend::OpenAI => "openai",
            LlmBackend::OpenRouter => "openrouter",
            LlmBackend::Ollama => "ollama",
            LlmBackend::LmStudio => "lmstudio",
            LlmBackend::OpenAICompatible { .. } => "openai-compatible",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Text-completion capability behind an OpenAI-compatible API.
///
/// Construction is eager and fallible: a missing model, an unknown provider
/// without a base URL, or missing credentials for a keyed provider must
/// surface at startup, before any pipeline run.
#[derive(Clone, Debug)]
pub struct LlmProvider {
    backend: LlmBackend,
    model: String,
    client: Arc<LlmApiClient>,
}

impl LlmProvider {
    pub fn new(config: Option<&LlmConfig>) -> Result<Self> {
        let config = config.ok_or_else(|| {
            LocusError::LlmUnavailable("LLM_MODEL is not set".to_string())
        })?;

        let (provider, model) = parse_llm_provider_model(&config.model);
        let backend = match provider.to_lowercase().as_str() {
            "openai" => LlmBackend::OpenAI,
            "openrouter" => LlmBackend::OpenRouter,
            "ollama" => LlmBackend::Ollama,
            "lmstudio" => LlmBackend::LmStudio,
            _ => match &config.base_url {
                Some(base_url) => LlmBackend::OpenAICompatible {
                    base_url: base_url.clone(),
                },
                None => {
                    return Err(LocusError::LlmUnavailable(format!(
                        "Unknown provider in model '{}' and no LLM_BASE_URL set",
                        config.model
                    )))
                }
            },
        };

        let client = LlmApiClient::new(config, &backend, model)?;

        Ok(Self {
            backend,
            model: model.to_string(),
            client: Arc::new(client),
        })
    }

    pub fn backend(&self) -> &LlmBackend {
        &self.backend
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<String> {
        self.client.complete(prompt, system_prompt, options).await
    }
}
