use crate::error::{Error, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub github_token: Option<String>,
    pub database_path: String,
    pub claude_model: Option<String>,
    pub concurrency_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let anthropic_api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            Error::Config("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;

        // Unauthenticated GitHub access works at a lower rate limit
        let github_token = env::var("GITHUB_TOKEN").ok();

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "relradar.db".to_string());

        let claude_model = env::var("CLAUDE_MODEL").ok();

        let concurrency_limit = env::var("CONCURRENCY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            anthropic_api_key,
            github_token,
            database_path,
            claude_model,
            concurrency_limit,
        })
    }
}
