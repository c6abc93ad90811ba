use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::auth::exchange::IAM_TOKEN_URL;
use crate::llm_client::DEFAULT_COMPLETION_URL;

const DEFAULT_MODEL: &str = "yandexgpt-lite/latest";

/// Application configuration loaded from environment variables.
/// Fails at startup if the model URI cannot be determined or a number is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub sa_key_file: PathBuf,
    pub iam_token_url: String,
    pub ai_api_url: String,
    pub folder_id: Option<String>,
    pub model_uri: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub user_prompt_template: Option<String>,
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    /// Wait before the first completion retry; doubles for each further one.
    pub retry_backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let folder_id = var("AI_FOLDER_ID");

        let model_uri = match (var("AI_MODEL_URI"), &folder_id) {
            (Some(uri), _) => uri,
            (None, Some(folder)) => format!("gpt://{folder}/{DEFAULT_MODEL}"),
            (None, None) => {
                bail!("Either 'AI_MODEL_URI' or 'AI_FOLDER_ID' must be set")
            }
        };

        Ok(Config {
            port: parse_or(&var, "PORT", 8080)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            sa_key_file: var("SA_KEY_FILE")
                .unwrap_or_else(|| "./sa-key.json".to_string())
                .into(),
            iam_token_url: var("IAM_TOKEN_URL").unwrap_or_else(|| IAM_TOKEN_URL.to_string()),
            ai_api_url: var("AI_API_URL").unwrap_or_else(|| DEFAULT_COMPLETION_URL.to_string()),
            folder_id,
            model_uri,
            temperature: parse_or(&var, "AI_TEMPERATURE", 0.6)?,
            max_tokens: parse_or(&var, "AI_MAX_TOKENS", 2000)?,
            system_prompt: var("AI_SYSTEM_PROMPT"),
            user_prompt_template: var("AI_USER_PROMPT_TEMPLATE"),
            http_timeout_secs: parse_or(&var, "HTTP_TIMEOUT_SECS", 60)?,
            max_retries: parse_or(&var, "AI_MAX_RETRIES", 0)?,
            retry_backoff_ms: parse_or(&var, "AI_RETRY_BACKOFF_MS", 1000)?,
        })
    }
}

fn parse_or<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
