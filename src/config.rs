use anyhow::{bail, Context, Result};
use clap::Parser;

pub const APP_NAME: &str = "OpenAsk";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const SYSTEM_PROMPT: &str = "You are OpenAsk, a helpful, intelligent, and precise AI assistant. \
You can analyze images and answer complex questions. Keep your answers concise yet comprehensive. \
Use Markdown for formatting.";

/// Text shown in place of a model reply whose stream failed.
pub const RESPONSE_ERROR_TEXT: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

#[derive(Debug, Parser)]
#[command(name = "openask", version, about = "Chat with Gemini from the terminal")]
pub struct Cli {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier
    #[arg(long, env = "OPENASK_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Override the API base URL
    #[arg(long, env = "OPENASK_BASE_URL")]
    pub base_url: Option<String>,

    /// Replace the built-in system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Settings fixed for the lifetime of the process.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub system_prompt: String,
    pub color: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("system_prompt", &self.system_prompt)
            .field("color", &self.color)
            .finish()
    }
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        // A missing key is not fatal here: the session reports it on first use.
        let api_key = cli
            .api_key
            .or_else(|| std::env::var("API_KEY").ok())
            .unwrap_or_default();

        let base_url = match cli.base_url {
            Some(raw) => Some(validate_base_url(&raw)?),
            None => None,
        };

        if cli.model.trim().is_empty() {
            bail!("Model identifier must not be empty");
        }

        Ok(Self {
            api_key,
            model: cli.model,
            base_url,
            system_prompt: cli
                .system_prompt
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
            color: !cli.no_color,
        })
    }
}

fn validate_base_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw).with_context(|| format!("Invalid base URL: {raw}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Base URL must use http or https: {raw}");
    }
    Ok(raw.trim_end_matches('/').to_string())
}
