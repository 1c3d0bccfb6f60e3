use serde::Deserialize;

use crate::models::{ImpactLevel, ReleaseNotes};

pub const SUMMARIZE_SYSTEM_PROMPT: &str = r#"You are an AI assistant helping to summarize release notes for software projects.

You must respond with valid JSON matching this exact schema:
{
    "summary": "string, the summarized release notes covering major features, performance improvements, and bug fixes",
    "impact_prediction": "high|medium|low, a first-pass guess at the impact on a downstream project"
}"#;

pub const ASSESS_SYSTEM_PROMPT: &str = r#"You are an AI assistant specialized in predicting the impact level of software releases on user projects.

You must respond with valid JSON matching this exact schema:
{
    "impact_level": "high|medium|low",
    "reason": "string, the reasoning behind the predicted impact level"
}

Use these criteria when determining the impact level:
- high: significant breaking changes, major new APIs that require refactoring, or features that directly conflict with or supersede parts of the user's project. Requires immediate and careful planning.
- medium: breaking changes that are easily addressable, new features that are beneficial but not critical, or deprecations that need attention. Requires some adjustments or testing.
- low: mostly bug fixes, minor performance improvements, or new features unlikely to have a significant direct impact on the project."#;

pub const OVERALL_SYSTEM_PROMPT: &str = r#"You are an AI assistant specialized in analyzing software release impact. The user is considering upgrading a dependency across multiple versions and needs one consolidated assessment for the entire upgrade.

You must respond with valid JSON matching this exact schema:
{
    "summary": "string, a consolidated summary of the most important new features, breaking changes, and bug fixes across all releases",
    "impact_level": "high|medium|low, a single overall level for the entire upgrade",
    "reason": "string, a concise explanation of which parts of the upgrade are most likely to affect the user's project"
}

Use these criteria when determining the overall impact level:
- high: significant breaking changes, major new APIs that require refactoring, or features that directly conflict with or supersede parts of the user's project. Requires immediate and careful planning.
- medium: breaking changes that are easily addressable, new features that are beneficial but not critical, or deprecations that need attention. Requires some adjustments or testing.
- low: mostly bug fixes, minor performance improvements, or new features unlikely to have a significant direct impact on the project. The upgrade should be straightforward."#;

/// Stage 1 of single-release analysis: condense the raw notes.
#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub release_notes: String,
    pub language: Option<String>,
}

impl SummarizeRequest {
    pub fn to_prompt(&self) -> String {
        let mut prompt = String::from(
            "Summarize the following release notes, highlighting major features, \
             performance improvements, and bug fixes. Also give a first-pass impact \
             prediction (high, medium, or low).\n",
        );
        push_language_clause(&mut prompt, self.language.as_deref(), "summary");
        prompt.push_str("\nRelease Notes:\n");
        prompt.push_str(&self.release_notes);
        prompt.push_str("\n\nProvide your response as JSON:\n");
        prompt
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeResponse {
    #[serde(default)]
    pub summary: Option<String>,
    /// Preliminary guess from the summarize stage; callers discard it in
    /// favor of the dedicated assessment.
    #[serde(default)]
    pub impact_prediction: Option<ImpactLevel>,
}

/// Stage 2 of single-release analysis: judge the stage-1 summary against the
/// user's project description.
#[derive(Debug, Clone)]
pub struct AssessRequest {
    pub release_notes_summary: String,
    pub project_description: String,
    pub language: Option<String>,
}

impl AssessRequest {
    pub fn to_prompt(&self) -> String {
        let mut prompt = String::from(
            "Based on the release notes summary and the project description below, \
             determine the impact level (high, medium, or low) and provide a brief \
             explanation.\n",
        );
        push_language_clause(&mut prompt, self.language.as_deref(), "explanation");
        prompt.push_str("\nRelease Notes Summary:\n");
        prompt.push_str(&self.release_notes_summary);
        prompt.push_str("\n\nProject Description:\n");
        prompt.push_str(&self.project_description);
        prompt.push_str("\n\nProvide your response as JSON:\n");
        prompt
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssessResponse {
    #[serde(default)]
    pub impact_level: Option<ImpactLevel>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// The consolidated multi-release analysis. Embeds every release's raw notes,
/// oldest first; no per-release pre-summaries are involved.
#[derive(Debug, Clone)]
pub struct OverallRequest {
    pub releases: Vec<ReleaseNotes>,
    pub project_description: String,
    pub language: Option<String>,
}

impl OverallRequest {
    pub fn to_prompt(&self) -> String {
        let mut prompt = format!(
            "Analyze the following series of {} release(s) and provide an overall \
             impact assessment for the user's project.\n",
            self.releases.len()
        );
        push_language_clause(&mut prompt, self.language.as_deref(), "summary and reason");

        prompt.push_str("\nThe user's project is described as:\n");
        prompt.push_str(&self.project_description);

        prompt.push_str("\n\nThe release notes, in order from oldest to newest, are:\n");
        for release in &self.releases {
            prompt.push_str(&format!("\n--- {} ---\n", release.version));
            prompt.push_str(&release.raw_notes);
            prompt.push('\n');
        }

        prompt.push_str("\nProvide your response as JSON:\n");
        prompt
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverallResponse {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub impact_level: Option<ImpactLevel>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn push_language_clause(prompt: &mut String, language: Option<&str>, field: &str) {
    if let Some(language) = language {
        prompt.push_str(&format!(
            "Write the {} in {}. Keep the impact level itself in English.\n",
            field, language
        ));
    }
}
