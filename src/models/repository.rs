use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback body text when an upstream release carries no notes.
pub const NO_NOTES_PLACEHOLDER: &str = "No release notes provided.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::High => "high",
            ImpactLevel::Medium => "medium",
            ImpactLevel::Low => "low",
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImpactLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "high" => Ok(ImpactLevel::High),
            "medium" => Ok(ImpactLevel::Medium),
            "low" => Ok(ImpactLevel::Low),
            other => Err(format!("unknown impact level: {other}")),
        }
    }
}

/// A single upstream release. `id` comes from GitHub and is stable across
/// refreshes; the analysis fields stay `None` until per-release analysis runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub version: String,
    pub published_at: DateTime<Utc>,
    pub raw_notes: String,
    pub summary: Option<String>,
    pub impact: Option<ImpactLevel>,
    pub reason: Option<String>,
}

/// Consolidated judgment over a repository's current release window.
/// Not invalidated when releases are appended later; recomputation is manual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallImpact {
    pub summary: String,
    pub impact: ImpactLevel,
    pub reason: String,
}

/// A tracked repository. `project_description` is a per-repository override;
/// `None` means the global settings description applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub url: String,
    pub stars: u32,
    pub forks: u32,
    pub project_description: Option<String>,
    pub releases: Vec<Release>,
    pub overall_impact: Option<OverallImpact>,
}

impl Repository {
    /// Releases are kept newest-first, so the latest known version is the head.
    pub fn latest_version(&self) -> Option<&str> {
        self.releases.first().map(|r| r.version.as_str())
    }
}

/// Repository metadata plus its release window as fetched from the source,
/// before a store identity exists.
#[derive(Debug, Clone)]
pub struct FetchedRepository {
    pub id: String,
    pub name: String,
    pub url: String,
    pub stars: u32,
    pub forks: u32,
    pub releases: Vec<Release>,
}

/// One release's notes as fed to the consolidated analysis.
#[derive(Debug, Clone)]
pub struct ReleaseNotes {
    pub version: String,
    pub raw_notes: String,
}
