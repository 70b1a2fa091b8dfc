//! Configuration for the bill extraction service.
//!
//! Everything the service reads from its environment (API key, listening
//! port, model choice) is collected once at startup into a [`ServerConfig`]
//! and handed to the router by reference. Nothing below the binary reads
//! environment variables directly.

use crate::error::BillExtractError;
use std::fmt;

/// Default Generative Language API root used by the built-in Gemini client.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default multimodal model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for the extraction service.
///
/// Built via [`ServerConfig::builder()`] or using [`ServerConfig::default()`].
///
/// # Example
/// ```rust
/// use bill_extract::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .api_key("test-key")
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,

    /// TCP port to listen on. Default: 3000. `0` picks an ephemeral port.
    pub port: u16,

    /// API key for the built-in Gemini client.
    pub api_key: Option<String>,

    /// Model identifier passed to the inference backend. Default: `gemini-2.0-flash`.
    pub model: String,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, the built-in Gemini REST client is used.
    pub provider_name: Option<String>,

    /// Root URL of the Generative Language API.
    pub api_base_url: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction wants the model to transcribe, not invent; keep it low.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// Long pharmacy bills can list well over a hundred items; a truncated
    /// reply is invalid JSON and fails the whole extraction.
    pub max_output_tokens: u32,

    /// Custom extraction prompt. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            temperature: 0.1,
            max_output_tokens: 8192,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The prompt sent alongside every image.
    pub fn prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(crate::prompts::EXTRACTION_PROMPT)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, BillExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(BillExtractError::InvalidConfig(
                "Model must not be empty".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(BillExtractError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.provider_name.is_none() && c.api_base_url.is_empty() {
            return Err(BillExtractError::InvalidConfig(
                "api_base_url must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ServerConfig::default();
        assert_eq!(c.port, 3000);
        assert_eq!(c.bind_addr(), "0.0.0.0:3000");
        assert_eq!(c.model, DEFAULT_MODEL);
        assert!(c.api_key.is_none());
        assert_eq!(c.prompt(), crate::prompts::EXTRACTION_PROMPT);
    }

    #[test]
    fn builder_clamps_and_trims() {
        let c = ServerConfig::builder()
            .temperature(5.0)
            .api_base_url("http://127.0.0.1:9000/v1beta/")
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.api_base_url, "http://127.0.0.1:9000/v1beta");
    }

    #[test]
    fn blank_api_key_is_none() {
        let c = ServerConfig::builder().api_key("   ").build().unwrap();
        assert!(c.api_key.is_none());
    }

    #[test]
    fn empty_model_rejected() {
        let err = ServerConfig::builder().model("").build().unwrap_err();
        assert!(matches!(err, BillExtractError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ServerConfig::builder().api_key("secret-123").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-123"));
        assert!(dbg.contains("<redacted>"));
    }
}
