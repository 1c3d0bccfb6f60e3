use async_trait::async_trait;
use reqwest::{header, Client};

use crate::error::{Error, Result};
use crate::github::rate_limiter::RateLimiter;
use crate::github::ReleaseSource;
use crate::models::{FetchedRepository, GitHubRelease, GitHubRepo, Release, NO_NOTES_PLACEHOLDER};

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: Option<&str>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| Error::Config(format!("Invalid GITHUB_TOKEN: {}", e)))?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("relradar/0.1"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(),
            base_url: "https://api.github.com".to_string(),
        })
    }

    async fn get_repo(&self, owner: &str, repo: &str) -> Result<GitHubRepo> {
        self.rate_limiter.wait().await;
        let url = format!("{}/repos/{}/{}", self.base_url, owner, repo);
        tracing::info!("Fetching repository metadata: {}/{}", owner, repo);

        let response = self.client.get(&url).send().await?;
        self.rate_limiter.update_from_response(&response).await;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::RepoNotFound(format!("{}/{}", owner, repo)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch repository {}/{}: {} - {}",
                owner, repo, status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Fetches the most recent page of releases, newest first.
    async fn get_releases(&self, owner: &str, repo: &str) -> Result<Vec<GitHubRelease>> {
        self.rate_limiter.wait().await;
        let url = format!("{}/repos/{}/{}/releases", self.base_url, owner, repo);
        tracing::debug!("Fetching releases: {}/{}", owner, repo);

        let response = self.client.get(&url).send().await?;
        self.rate_limiter.update_from_response(&response).await;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch releases for {}/{}: {} - {}",
                owner, repo, status, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ReleaseSource for GitHubClient {
    async fn fetch_repository(&self, url: &str, start_tag: &str) -> Result<FetchedRepository> {
        let (owner, repo) = parse_github_url(url)?;

        let metadata = self.get_repo(&owner, &repo).await?;
        let releases = self.get_releases(&owner, &repo).await?;

        if releases.is_empty() {
            return Err(Error::NoReleases(format!(
                "no releases found for {}",
                metadata.full_name
            )));
        }

        let window = release_window(releases, start_tag)?;

        Ok(FetchedRepository {
            id: metadata.id.to_string(),
            name: metadata.full_name,
            url: metadata.html_url,
            stars: metadata.stargazers_count,
            forks: metadata.forks_count,
            releases: window,
        })
    }

    async fn fetch_releases_newer_than(
        &self,
        repo_name: &str,
        known_latest_tag: &str,
    ) -> Result<Vec<Release>> {
        let (owner, repo) = repo_name
            .split_once('/')
            .map(|(o, r)| (o.to_string(), r.to_string()))
            .ok_or_else(|| Error::InvalidUrl(repo_name.to_string()))?;

        let releases = self.get_releases(&owner, &repo).await?;
        Ok(releases_newer_than(releases, known_latest_tag))
    }
}

/// Extracts `(owner, repo)` from a `github.com/<owner>/<repo>` URL.
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let rest = rest.strip_prefix("www.").unwrap_or(rest);

    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    match (parts.next(), parts.next(), parts.next()) {
        (Some("github.com"), Some(owner), Some(repo)) => {
            let repo = repo.strip_suffix(".git").unwrap_or(repo);
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(Error::InvalidUrl(url.to_string())),
    }
}

/// All releases from latest back through and including `start_tag`.
fn release_window(releases: Vec<GitHubRelease>, start_tag: &str) -> Result<Vec<Release>> {
    let start_index = releases
        .iter()
        .position(|r| r.tag_name == start_tag)
        .ok_or_else(|| Error::VersionNotFound(start_tag.to_string()))?;

    Ok(releases
        .into_iter()
        .take(start_index + 1)
        .map(into_release)
        .collect())
}

/// Releases strictly newer than `known_latest_tag`; empty when the tag is
/// already the newest or has scrolled off the most recent page.
fn releases_newer_than(releases: Vec<GitHubRelease>, known_latest_tag: &str) -> Vec<Release> {
    match releases.iter().position(|r| r.tag_name == known_latest_tag) {
        Some(index) if index > 0 => releases.into_iter().take(index).map(into_release).collect(),
        _ => Vec::new(),
    }
}

fn into_release(release: GitHubRelease) -> Release {
    let raw_notes = match release.body {
        Some(body) if !body.trim().is_empty() => body,
        _ => NO_NOTES_PLACEHOLDER.to_string(),
    };

    Release {
        id: release.id.to_string(),
        version: release.tag_name,
        published_at: release.published_at,
        raw_notes,
        summary: None,
        impact: None,
        reason: None,
    }
}
