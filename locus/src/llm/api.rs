use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};

use crate::config::LlmConfig;
use crate::error::{LocusError, Result};
use crate::llm::provider::{CompletionOptions, LlmBackend};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const LMSTUDIO_BASE_URL: &str = "http://localhost:1234/v1";

#[derive(Clone, Debug)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl LlmApiClient {
    pub fn new(config: &LlmConfig, backend: &LlmBackend, model: &str) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(backend).to_string());

        let needs_api_key = matches!(backend, LlmBackend::OpenAI | LlmBackend::OpenRouter);
        if needs_api_key && config.api_key.is_none() {
            return Err(LocusError::Llm(
                "API key required for this provider".to_string(),
            ));
        }

        let openai_config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LocusError::Llm(format!("Failed to create LLM HTTP client: {error}")))?;

        // Cap async-openai's internal backoff at our timeout; its default
        // max_elapsed_time retries 500s for up to 15 minutes.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            model: model.to_string(),
            max_retries: config.max_retries,
        })
    }

    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(LocusError::Validation("Prompt cannot be empty".to_string()));
        }

        let mut last_error: Option<LocusError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_request(prompt, system_prompt, options)?;

            match self.client.chat().create(request).await {
                Ok(response) => return Self::extract_content(response),
                Err(error) => {
                    if let Some(fatal) = Self::fatal_error(&error) {
                        return Err(fatal);
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped = map_openai_error(error);

                    if retryable && attempt < self.max_retries {
                        last_error = Some(mapped);
                        continue;
                    }

                    return Err(mapped);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LocusError::Llm("LLM completion failed after retries".to_string())))
    }

    fn build_request(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<CreateChatCompletionRequest> {
        let mut messages = Vec::new();

        if let Some(system_prompt) = system_prompt.filter(|value| !value.trim().is_empty()) {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|error| {
                        LocusError::Validation(format!("Invalid system prompt: {error}"))
                    })?
                    .into(),
            );
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|error| LocusError::Validation(format!("Invalid user prompt: {error}")))?
                .into(),
        );

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(self.model.clone()).messages(messages);

        if let Some(options) = options {
            if let Some(temperature) = options.temperature {
                request.temperature(temperature);
            }
            if let Some(max_tokens) = options.max_tokens {
                request.max_tokens(max_tokens);
            }
        }

        request
            .build()
            .map_err(|error| LocusError::Validation(format!("Invalid completion request: {error}")))
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LocusError::Llm("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(LocusError::Llm(
                "LLM response contained empty content".to_string(),
            ));
        }

        Ok(message)
    }

    /// Rate-limit and auth failures abort the retry loop immediately.
    fn fatal_error(error: &OpenAIError) -> Option<LocusError> {
        match error {
            OpenAIError::Reqwest(reqwest_error) => match reqwest_error.status() {
                Some(reqwest::StatusCode::TOO_MANY_REQUESTS) => {
                    Some(LocusError::LlmRateLimit { retry_after: None })
                }
                Some(reqwest::StatusCode::UNAUTHORIZED) | Some(reqwest::StatusCode::FORBIDDEN) => {
                    Some(LocusError::Llm(format!(
                        "LLM authentication failed: {reqwest_error}"
                    )))
                }
                _ => None,
            },
            OpenAIError::ApiError(api_error) if is_rate_limit_api_error(api_error) => {
                Some(LocusError::LlmRateLimit { retry_after: None })
            }
            OpenAIError::ApiError(api_error) if is_auth_api_error(api_error) => Some(
                LocusError::Llm(format!("LLM authentication failed: {api_error}")),
            ),
            _ => None,
        }
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }
}

fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
    let message = api_error.message.to_lowercase();
    let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
    let code = api_error.code.clone().unwrap_or_default().to_lowercase();

    message.contains("rate limit")
        || message.contains("too many requests")
        || error_type.contains("rate_limit")
        || code.contains("rate_limit")
        || code == "insufficient_quota"
}

fn is_auth_api_error(api_error: &ApiError) -> bool {
    let message = api_error.message.to_lowercase();
    let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
    let code = api_error.code.clone().unwrap_or_default().to_lowercase();

    message.contains("unauthorized")
        || message.contains("authentication")
        || message.contains("invalid api key")
        || code.contains("invalid_api_key")
        || error_type.contains("authentication")
}

fn map_openai_error(error: OpenAIError) -> LocusError {
    match error {
        OpenAIError::Reqwest(reqwest_error) => {
            LocusError::Llm(format!("LLM request failed: {reqwest_error}"))
        }
        OpenAIError::ApiError(api_error) => LocusError::Llm(format!("LLM API error: {api_error}")),
        OpenAIError::JSONDeserialize(err) => {
            LocusError::Llm(format!("Failed to parse LLM response: {err}"))
        }
        OpenAIError::InvalidArgument(message) => LocusError::Validation(message),
        other => LocusError::Llm(other.to_string()),
    }
}

fn default_base_url(backend: &LlmBackend) -> &str {
    match backend {
        LlmBackend::OpenAI => OPENAI_BASE_URL,
        LlmBackend::OpenRouter => OPENROUTER_BASE_URL,
        LlmBackend::Ollama => OLLAMA_BASE_URL,
        LlmBackend::LmStudio => LMSTUDIO_BASE_URL,
        LlmBackend::OpenAICompatible { base_url } => base_url,
    }
}
