use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Repository metadata as returned by `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub id: u64,
    pub full_name: String,
    pub html_url: String,
    pub stargazers_count: u32,
    pub forks_count: u32,
}

/// One entry from `GET /repos/{owner}/{repo}/releases`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub id: u64,
    pub tag_name: String,
    pub published_at: DateTime<Utc>,
    pub body: Option<String>,
}
