use std::sync::Arc;

use crate::error::{Error, Result};
use crate::llm::parser::parse_structured_response;
use crate::llm::prompts::{
    AssessRequest, AssessResponse, OverallRequest, OverallResponse, SummarizeRequest,
    SummarizeResponse, ASSESS_SYSTEM_PROMPT, OVERALL_SYSTEM_PROMPT, SUMMARIZE_SYSTEM_PROMPT,
};
use crate::llm::{CompletionRequest, LlmProvider};
use crate::models::{ImpactLevel, ReleaseNotes};

/// Minimum release count accepted by `analyze_overall`. A single release is a
/// legitimate one-step upgrade; only an empty set is rejected.
pub const MIN_RELEASES_FOR_OVERALL: usize = 1;

/// A structured impact judgment, for one release or a whole upgrade span.
#[derive(Debug, Clone)]
pub struct ReleaseAnalysis {
    pub summary: String,
    pub impact: ImpactLevel,
    pub reason: String,
}

/// The impact analysis pipeline. Pure over its inputs; persisting results is
/// the caller's responsibility.
pub struct ImpactAnalyzer {
    llm: Arc<dyn LlmProvider>,
}

impl ImpactAnalyzer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Single-release analysis: summarize the raw notes, then assess the
    /// summary against the project description. The preliminary impact guess
    /// from the summarize stage is discarded.
    pub async fn analyze_release(
        &self,
        raw_notes: &str,
        project_description: &str,
        language: Option<&str>,
    ) -> Result<ReleaseAnalysis> {
        if project_description.trim().is_empty() {
            return Err(Error::MissingProjectDescription);
        }

        tracing::debug!("Summarizing release notes via {}", self.llm.name());
        let summarize = SummarizeRequest {
            release_notes: raw_notes.to_string(),
            language: language.map(String::from),
        };
        let response = self
            .llm
            .complete(CompletionRequest::new(
                SUMMARIZE_SYSTEM_PROMPT,
                summarize.to_prompt(),
            ))
            .await?;
        let summarized: SummarizeResponse = parse_structured_response(&response)?;

        let summary = match summarized.summary {
            Some(summary) if !summary.trim().is_empty() => summary,
            _ => return Err(Error::EmptySummary),
        };

        tracing::debug!("Assessing impact against project description");
        let assess = AssessRequest {
            release_notes_summary: summary.clone(),
            project_description: project_description.to_string(),
            language: language.map(String::from),
        };
        let response = self
            .llm
            .complete(CompletionRequest::new(
                ASSESS_SYSTEM_PROMPT,
                assess.to_prompt(),
            ))
            .await?;
        let assessed: AssessResponse = parse_structured_response(&response)?;

        let impact = assessed
            .impact_level
            .ok_or_else(|| Error::ImpactPrediction("missing impact level".to_string()))?;
        let reason = match assessed.reason {
            Some(reason) if !reason.trim().is_empty() => reason,
            _ => return Err(Error::ImpactPrediction("missing reason".to_string())),
        };

        Ok(ReleaseAnalysis {
            summary,
            impact,
            reason,
        })
    }

    /// Consolidated analysis over an upgrade span. `releases` must be ordered
    /// oldest to newest and always carries raw notes; per-release summaries
    /// are never consulted.
    pub async fn analyze_overall(
        &self,
        releases: &[ReleaseNotes],
        project_description: &str,
        language: Option<&str>,
    ) -> Result<ReleaseAnalysis> {
        if project_description.trim().is_empty() {
            return Err(Error::MissingProjectDescription);
        }
        if releases.len() < MIN_RELEASES_FOR_OVERALL {
            return Err(Error::NoReleases(
                "at least one release is required for an overall analysis".to_string(),
            ));
        }

        tracing::debug!(
            "Running consolidated analysis over {} release(s)",
            releases.len()
        );
        let request = OverallRequest {
            releases: releases.to_vec(),
            project_description: project_description.to_string(),
            language: language.map(String::from),
        };
        let response = self
            .llm
            .complete(CompletionRequest::new(
                OVERALL_SYSTEM_PROMPT,
                request.to_prompt(),
            ))
            .await?;
        let overall: OverallResponse = parse_structured_response(&response)?;

        let summary = overall
            .summary
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::OverallAnalysis("missing summary".to_string()))?;
        let impact = overall
            .impact_level
            .ok_or_else(|| Error::OverallAnalysis("missing impact level".to_string()))?;
        let reason = overall
            .reason
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| Error::OverallAnalysis("missing reason".to_string()))?;

        Ok(ReleaseAnalysis {
            summary,
            impact,
            reason,
        })
    }
}
