//! CLI binary for bill-extract.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServerConfig`, then either serves the HTTP API or runs a
//! single extraction and prints the result.

use anyhow::{Context, Result};
use bill_extract::{extract_bill, serve, AppState, ServerConfig};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port (3000)
  GEMINI_API_KEY=AIza... bill-extract

  # Serve on another port
  PORT=8080 bill-extract

  # Extract one bill and print the JSON result
  bill-extract --extract https://example.org/bills/hospital-bill.png

  # Use another vision provider through edgequake-llm
  OPENAI_API_KEY=sk-... bill-extract --provider openai --model gpt-4.1-mini

  # Query a running server
  curl -s localhost:3000/extract-bill-data \
       -H 'content-type: application/json' \
       -d '{"document": "https://example.org/bills/hospital-bill.png"}'

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          API key for the built-in Gemini client
  PORT                    Listening port (default 3000)
  HOST                    Bind address (default 0.0.0.0)
  BILL_EXTRACT_MODEL      Model ID (default gemini-2.0-flash)
  BILL_EXTRACT_PROVIDER   edgequake-llm provider (openai, anthropic, gemini, ollama, ...)
  GEMINI_API_BASE_URL     Override the Generative Language API root
  RUST_LOG                tracing filter, overrides --verbose
"#;

/// Extract line items from bill images with a multimodal LLM.
#[derive(Parser, Debug)]
#[command(
    name = "bill-extract",
    version,
    about = "Extract line items from bill and invoice images using multimodal LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// API key for the built-in Gemini client.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID (e.g. gemini-2.0-flash, gemini-2.5-pro, gpt-4.1-mini).
    #[arg(long, env = "BILL_EXTRACT_MODEL", default_value = bill_extract::config::DEFAULT_MODEL)]
    model: String,

    /// edgequake-llm provider; omit to use the built-in Gemini client.
    #[arg(long, env = "BILL_EXTRACT_PROVIDER")]
    provider: Option<String>,

    /// Generative Language API root.
    #[arg(long, env = "GEMINI_API_BASE_URL", default_value = bill_extract::config::DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, default_value_t = 0.1)]
    temperature: f32,

    /// Max tokens the model may generate.
    #[arg(long, default_value_t = 8192)]
    max_tokens: u32,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Extract a single bill from this URL, print the JSON result and exit.
    #[arg(long, value_name = "URL")]
    extract: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config + state ─────────────────────────────────────────────
    let config = build_config(&cli).await?;
    tracing::debug!("{:?}", config);
    let state = AppState::from_config(config).context("Failed to initialise inference backend")?;

    // ── One-shot mode ────────────────────────────────────────────────────
    if let Some(ref url) = cli.extract {
        let result = extract_bill(
            &state.http,
            state.inference.as_ref(),
            state.config.prompt(),
            url,
        )
        .await
        .context("Extraction failed")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
        return Ok(());
    }

    // ── Serve ────────────────────────────────────────────────────────────
    serve(state).await.context("Server failed")?;
    Ok(())
}

/// Map CLI args to `ServerConfig`.
async fn build_config(cli: &Cli) -> Result<ServerConfig> {
    let mut builder = ServerConfig::builder()
        .host(cli.host.clone())
        .port(cli.port)
        .model(cli.model.clone())
        .api_base_url(cli.api_base_url.clone())
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_tokens);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
