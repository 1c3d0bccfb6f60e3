use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid GitHub repository URL: {0}")]
    InvalidUrl(String),

    #[error("A non-empty project description is required. Set one in settings before running analysis.")]
    MissingProjectDescription,

    #[error("No releases available: {0}")]
    NoReleases(String),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Release not found: {0}")]
    ReleaseNotFound(String),

    #[error("Version tag \"{0}\" not found among the most recent releases")]
    VersionNotFound(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Model returned an empty release notes summary")]
    EmptySummary,

    #[error("Impact prediction incomplete: {0}")]
    ImpactPrediction(String),

    #[error("Overall analysis incomplete: {0}")]
    OverallAnalysis(String),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Rejected before any network or store access happens.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_) | Error::MissingProjectDescription | Error::NoReleases(_)
        )
    }
}
