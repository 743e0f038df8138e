//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.tiendita/config.json`) and
//! environment. Secrets (the LLM API key) are taken from the environment
//! first so they never need to live in the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Catalog/cart API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Language-model endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Bot behavior: debounce, environment, admin allow-list.
    #[serde(default)]
    pub bot: BotConfig,
}

/// Catalog/cart HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL of the catalog/cart API (default "http://localhost:3001").
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds (default 15).
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_api_timeout_secs() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

/// LLM completion endpoint settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Base URL (default "https://api.openai.com/v1").
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model name (default "gpt-5-nano").
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key. Overridden by LLM_API_KEY env when set.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds (default 60).
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-5-nano".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Bot behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// Quiet period for the message debouncer in milliseconds (default 2000).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Deployment environment the durable bot state is keyed by
    /// (default "development"; TIENDITA_ENV overrides).
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Sender ids allowed to run admin commands. Entries are normalized the
    /// same way inbound sender ids are (alphanumerics only), so any of
    /// "5491123456789", "+54 911 2345-6789" matches the same admin.
    #[serde(default)]
    pub authorized_numbers: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            environment: default_environment(),
            authorized_numbers: Vec::new(),
        }
    }
}

/// Resolve the LLM API key: env LLM_API_KEY overrides config.
pub fn resolve_llm_api_key(config: &Config) -> Option<String> {
    std::env::var("LLM_API_KEY")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .llm
                .api_key
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the deployment environment: env TIENDITA_ENV overrides config.
pub fn resolve_environment(config: &Config) -> String {
    std::env::var("TIENDITA_ENV")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.bot.environment.clone())
}

/// Resolve config path from env or default (~/.tiendita/config.json).
pub fn default_config_path() -> PathBuf {
    std::env::var("TIENDITA_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".tiendita").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or TIENDITA_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
