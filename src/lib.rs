pub mod config;
pub mod error;
pub mod models;
pub mod github;
pub mod llm;
pub mod analysis;
pub mod storage;
pub mod tracker;

pub use config::Config;
pub use error::{Error, Result};
pub use github::{GitHubClient, ReleaseSource};
pub use llm::{ClaudeProvider, LlmProvider};
pub use analysis::ImpactAnalyzer;
pub use storage::Storage;
pub use tracker::Tracker;
