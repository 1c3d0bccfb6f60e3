pub mod client;
pub mod rate_limiter;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FetchedRepository, Release};

pub use client::GitHubClient;
pub use rate_limiter::RateLimiter;

/// The release data source, kept behind a trait so the orchestration layer
/// treats it as a black-box collaborator.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Resolve a `github.com/<owner>/<repo>` URL, fetch repository metadata
    /// and the releases from latest back through `start_tag` inclusive.
    async fn fetch_repository(&self, url: &str, start_tag: &str) -> Result<FetchedRepository>;

    /// Fetch the releases strictly newer than `known_latest_tag`. Empty when
    /// the tag is already the newest or absent from the most recent page.
    async fn fetch_releases_newer_than(
        &self,
        repo_name: &str,
        known_latest_tag: &str,
    ) -> Result<Vec<Release>>;
}
