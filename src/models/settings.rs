use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "English";

/// Singleton settings record. The store guarantees at most one row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub project_description: String,
    pub language: String,
}

impl ProjectSettings {
    pub fn new(project_description: impl Into<String>, language: Option<String>) -> Self {
        Self {
            project_description: project_description.into(),
            language: language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        }
    }
}
