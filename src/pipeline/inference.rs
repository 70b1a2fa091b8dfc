//! Multimodal inference: send the bill image and prompt, get text back.
//!
//! The rest of the pipeline only needs two things from the model: the reply
//! text and, when the provider reports it, token usage. [`InferenceClient`]
//! captures exactly that so the handler can be exercised with a stub and the
//! backend can be swapped without touching normalisation.
//!
//! Two backends ship with the crate:
//!
//! * [`GeminiClient`]: direct REST call to `models/{model}:generateContent`.
//!   This is the default and the only one that reports Gemini's
//!   `usageMetadata` verbatim.
//! * [`ProviderClient`]: any vision provider edgequake-llm knows about,
//!   selected with `--provider`.

use crate::config::ServerConfig;
use crate::error::BillExtractError;
use crate::pipeline::encode::InlineImage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Raw model output before normalisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub usage: Option<UsageMetadata>,
}

/// Usage metering as reported by the provider. Any count may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "totalTokenCount", default)]
    pub total_token_count: Option<u64>,
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_token_count: Option<u64>,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidates_token_count: Option<u64>,
}

/// A multimodal model that can read an image.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Send `prompt` plus `image` and return the reply text and usage.
    async fn generate(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<ModelReply, BillExtractError>;
}

/// Pick the inference backend described by `config`.
///
/// 1. **Named provider** (`config.provider_name`): built through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    API key from the environment.
/// 2. **Built-in Gemini client**: requires `config.api_key`.
pub fn client_from_config(
    config: &ServerConfig,
    http: reqwest::Client,
) -> Result<Arc<dyn InferenceClient>, BillExtractError> {
    if let Some(ref name) = config.provider_name {
        return Ok(Arc::new(ProviderClient::from_config(name, config)?));
    }

    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| BillExtractError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: "Set GEMINI_API_KEY (or pass --api-key), or choose another backend with --provider."
                .to_string(),
        })?;

    Ok(Arc::new(GeminiClient::new(http, api_key, config)))
}

// ── Gemini REST backend ──────────────────────────────────────────────────────

/// Direct client for the Generative Language `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: String, config: &ServerConfig) -> Self {
        Self {
            http,
            api_key,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.api_base_url, config.model
            ),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    fn request_body(&self, prompt: &str, image: &InlineImage) -> serde_json::Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": image.data
                        }
                    }
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens
            }
        })
    }

    fn failed(&self, message: impl Into<String>) -> BillExtractError {
        BillExtractError::InferenceFailed {
            provider: self.name().to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate; empty when the model
    /// produced no candidate (e.g. a blocked prompt).
    fn into_reply(self) -> ModelReply {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        ModelReply {
            text,
            usage: self.usage_metadata,
        }
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<ModelReply, BillExtractError> {
        let start = Instant::now();

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt, image))
            .send()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.failed(format!("HTTP {status}: {body}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| self.failed(format!("unreadable response body: {e}")))?;
        let reply = parsed.into_reply();

        debug!(
            "gemini: {} chars, usage {:?}, {:?}",
            reply.text.len(),
            reply.usage,
            start.elapsed()
        );
        Ok(reply)
    }
}

// ── edgequake-llm backend ────────────────────────────────────────────────────

/// Adapter over any edgequake-llm provider with vision support.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    name: String,
    options: CompletionOptions,
}

impl ProviderClient {
    /// Wrap a pre-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>, config: &ServerConfig) -> Self {
        Self {
            provider,
            name: name.into(),
            options: build_options(config),
        }
    }

    /// Instantiate the named provider with the configured model.
    pub fn from_config(name: &str, config: &ServerConfig) -> Result<Self, BillExtractError> {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            BillExtractError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, name, config))
    }
}

/// Build `CompletionOptions` from the server config.
fn build_options(config: &ServerConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_output_tokens as usize),
        ..Default::default()
    }
}

#[async_trait]
impl InferenceClient for ProviderClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<ModelReply, BillExtractError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user_with_images(
            prompt,
            vec![ImageData::new(image.data.clone(), image.mime_type.as_str())],
        )];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| BillExtractError::InferenceFailed {
                provider: self.name.clone(),
                message: format!("{e}"),
            })?;

        let input = response.prompt_tokens as u64;
        let output = response.completion_tokens as u64;
        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.name,
            input,
            output,
            start.elapsed()
        );

        Ok(ModelReply {
            text: response.content,
            usage: Some(UsageMetadata {
                total_token_count: Some(input + output),
                prompt_token_count: Some(input),
                candidates_token_count: Some(output),
            }),
        })
    }
}
