use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::llm_client::DEFAULT_EMBEDDING_MODEL;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_organization_id: Option<String>,
    pub openai_project_id: Option<String>,
    pub model: String,
    pub advanced_model: String,
    pub embedding_model: String,
    /// How many accomplishment chunks semantic search hands to the resume generator.
    pub semantic_top_k: usize,
    pub data_dir: PathBuf,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Approximate token budget for crawled company text.
    pub company_token_budget: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_organization_id: optional_env("OPENAI_ORGANIZATION_ID"),
            openai_project_id: optional_env("OPENAI_PROJECT_ID"),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            advanced_model: std::env::var("OPENAI_ADVANCED_MODEL")
                .unwrap_or_else(|_| "o1-preview".to_string()),
            embedding_model: std::env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            semantic_top_k: parse_env("SEMANTIC_TOP_K", 10)
                .context("SEMANTIC_TOP_K must be a positive integer")?,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            company_token_budget: parse_env("COMPANY_TOKEN_BUDGET", 5000)
                .context("COMPANY_TOKEN_BUDGET must be a positive integer")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn result_dir(&self) -> PathBuf {
        self.data_dir.join("result")
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for '{key}': {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Config rooted at a scratch data directory; never touches the process environment.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Config {
            openai_api_key: "test-key".to_string(),
            openai_base_url: "http://127.0.0.1:9".to_string(),
            openai_organization_id: None,
            openai_project_id: None,
            model: "test-model".to_string(),
            advanced_model: "test-advanced-model".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            semantic_top_k: 10,
            data_dir,
            port: 0,
            max_upload_bytes: 1024 * 1024,
            company_token_budget: 5000,
            rust_log: "info".to_string(),
        }
    }
}
