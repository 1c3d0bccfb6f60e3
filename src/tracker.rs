use std::sync::Arc;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use crate::analysis::{ImpactAnalyzer, ReleaseAnalysis};
use crate::error::{Error, Result};
use crate::github::ReleaseSource;
use crate::llm::LlmProvider;
use crate::models::{OverallImpact, ProjectSettings, ReleaseNotes, Repository, DEFAULT_LANGUAGE};
use crate::storage::Storage;

/// Outcome of a refresh pass across every tracked repository.
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    pub new_releases: usize,
    pub refreshed: usize,
    pub skipped: usize,
}

/// Orchestrates the store, the release source, and the analysis pipeline.
/// Every operation is one validate -> fetch/compute -> persist -> report pass.
pub struct Tracker {
    source: Arc<dyn ReleaseSource>,
    analyzer: ImpactAnalyzer,
    storage: Storage,
    concurrency_limit: usize,
}

impl Tracker {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        llm: Arc<dyn LlmProvider>,
        storage: Storage,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            source,
            analyzer: ImpactAnalyzer::new(llm),
            storage,
            concurrency_limit,
        }
    }

    pub fn settings(&self) -> Result<Option<ProjectSettings>> {
        self.storage.get_settings()
    }

    pub fn update_settings(
        &self,
        project_description: &str,
        language: Option<String>,
    ) -> Result<ProjectSettings> {
        // An explicit language wins; otherwise keep what was configured before
        let language = match language {
            Some(language) => Some(language),
            None => self.storage.get_settings()?.map(|s| s.language),
        };

        let settings = ProjectSettings::new(project_description, language);
        self.storage.upsert_settings(&settings)?;
        Ok(settings)
    }

    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.storage.get_all_repositories()
    }

    /// Tracks a new repository. Requires configured settings with a non-empty
    /// project description; rejected before any network call otherwise.
    pub async fn add_repository(&self, url: &str, start_tag: &str) -> Result<Repository> {
        let settings = self.storage.get_settings()?;
        if !settings
            .as_ref()
            .is_some_and(|s| !s.project_description.trim().is_empty())
        {
            return Err(Error::MissingProjectDescription);
        }

        let fetched = self.source.fetch_repository(url, start_tag).await?;
        tracing::info!(
            "Adding {} with {} release(s)",
            fetched.name,
            fetched.releases.len()
        );

        self.storage.insert_repository(&fetched)
    }

    pub fn remove_repository(&self, name: &str) -> Result<()> {
        let repository = self
            .storage
            .get_repository_by_name(name)?
            .ok_or_else(|| Error::RepoNotFound(name.to_string()))?;

        self.storage.delete_repository(&repository.id)
    }

    /// Sets or clears the per-repository project description override.
    pub fn set_project_description(&self, name: &str, description: Option<&str>) -> Result<()> {
        let repository = self
            .storage
            .get_repository_by_name(name)?
            .ok_or_else(|| Error::RepoNotFound(name.to_string()))?;

        self.storage
            .set_project_description(&repository.id, description)
    }

    /// Fetches releases newer than each repository's latest known version.
    /// Fetches run independently; one repository failing is logged and
    /// skipped without touching its release list or the other repositories.
    pub async fn refresh_all(&self) -> Result<RefreshSummary> {
        let repositories = self.storage.get_all_repositories()?;

        let targets: Vec<(String, String, String)> = repositories
            .iter()
            .filter_map(|repo| {
                repo.latest_version()
                    .map(|latest| (repo.id.clone(), repo.name.clone(), latest.to_string()))
            })
            .collect();

        let pb = ProgressBar::new(targets.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} repos")
                .unwrap()
                .progress_chars("#>-"),
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut fetches = Vec::new();

        for (id, name, latest) in targets {
            let source = self.source.clone();
            let sem = semaphore.clone();
            let pb_clone = pb.clone();

            fetches.push(async move {
                let _permit = sem.acquire().await.ok();
                let result = source.fetch_releases_newer_than(&name, &latest).await;
                pb_clone.inc(1);
                (id, name, result)
            });
        }

        let results = join_all(fetches).await;
        pb.finish_with_message("Refresh complete");

        let mut summary = RefreshSummary::default();
        for (id, name, result) in results {
            match result {
                Ok(releases) => {
                    if !releases.is_empty() {
                        summary.new_releases += self.storage.add_releases(&id, &releases)?;
                    }
                    summary.refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping {} during refresh: {}", name, e);
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!(
            "Found {} new release(s) across {} repositories",
            summary.new_releases,
            summary.refreshed
        );
        Ok(summary)
    }

    /// Runs the two-stage analysis for one release and persists the result.
    pub async fn analyze_release(&self, name: &str, version: &str) -> Result<ReleaseAnalysis> {
        let repository = self
            .storage
            .get_repository_by_name(name)?
            .ok_or_else(|| Error::RepoNotFound(name.to_string()))?;

        let release = repository
            .releases
            .iter()
            .find(|r| r.version == version)
            .ok_or_else(|| Error::ReleaseNotFound(format!("{} {}", name, version)))?;

        let settings = self.storage.get_settings()?;
        let description = resolved_description(&repository, settings.as_ref())
            .ok_or(Error::MissingProjectDescription)?;
        let language = language_of(settings.as_ref());

        let analysis = self
            .analyzer
            .analyze_release(&release.raw_notes, &description, language.as_deref())
            .await?;

        self.storage.update_release_analysis(
            &release.id,
            &analysis.summary,
            analysis.impact,
            &analysis.reason,
        )?;

        Ok(analysis)
    }

    /// Runs the consolidated upgrade analysis over every tracked release of
    /// the repository, oldest first, and persists the result.
    pub async fn analyze_overall(&self, name: &str) -> Result<ReleaseAnalysis> {
        let repository = self
            .storage
            .get_repository_by_name(name)?
            .ok_or_else(|| Error::RepoNotFound(name.to_string()))?;

        let settings = self.storage.get_settings()?;
        let description = resolved_description(&repository, settings.as_ref())
            .ok_or(Error::MissingProjectDescription)?;
        let language = language_of(settings.as_ref());

        // Stored newest-first; the consolidated prompt wants oldest-first,
        // and always the raw notes, never prior per-release summaries.
        let releases: Vec<ReleaseNotes> = repository
            .releases
            .iter()
            .rev()
            .map(|r| ReleaseNotes {
                version: r.version.clone(),
                raw_notes: r.raw_notes.clone(),
            })
            .collect();

        let analysis = self
            .analyzer
            .analyze_overall(&releases, &description, language.as_deref())
            .await?;

        self.storage.update_overall_impact(
            &repository.id,
            &OverallImpact {
                summary: analysis.summary.clone(),
                impact: analysis.impact,
                reason: analysis.reason.clone(),
            },
        )?;

        Ok(analysis)
    }
}

/// Override-if-present, else the global settings description; `None` when
/// neither yields non-empty text.
fn resolved_description(
    repository: &Repository,
    settings: Option<&ProjectSettings>,
) -> Option<String> {
    repository
        .project_description
        .as_ref()
        .filter(|d| !d.trim().is_empty())
        .cloned()
        .or_else(|| {
            settings
                .map(|s| s.project_description.clone())
                .filter(|d| !d.trim().is_empty())
        })
}

fn language_of(settings: Option<&ProjectSettings>) -> Option<String> {
    let language = settings.map(|s| s.language.clone())?;
    if language.trim().is_empty() || language == DEFAULT_LANGUAGE {
        None
    } else {
        Some(language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::llm::CompletionRequest;
    use crate::models::{FetchedRepository, ImpactLevel, Release};

    struct StubSource {
        fetch_repository_calls: AtomicUsize,
        repository: Option<FetchedRepository>,
        newer: HashMap<String, Vec<Release>>,
        failing: HashSet<String>,
    }

    impl StubSource {
        fn empty() -> Self {
            Self {
                fetch_repository_calls: AtomicUsize::new(0),
                repository: None,
                newer: HashMap::new(),
                failing: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl ReleaseSource for StubSource {
        async fn fetch_repository(&self, url: &str, _start_tag: &str) -> Result<FetchedRepository> {
            self.fetch_repository_calls.fetch_add(1, Ordering::SeqCst);
            self.repository
                .clone()
                .ok_or_else(|| Error::RepoNotFound(url.to_string()))
        }

        async fn fetch_releases_newer_than(
            &self,
            repo_name: &str,
            _known_latest_tag: &str,
        ) -> Result<Vec<Release>> {
            if self.failing.contains(repo_name) {
                return Err(Error::GitHubApi(format!("boom for {}", repo_name)));
            }
            Ok(self.newer.get(repo_name).cloned().unwrap_or_default())
        }
    }

    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.prompt.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::LlmApi("no scripted response left".to_string()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn release(id: &str, version: &str, day: u32, notes: &str) -> Release {
        Release {
            id: id.to_string(),
            version: version.to_string(),
            published_at: chrono::Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
            raw_notes: notes.to_string(),
            summary: None,
            impact: None,
            reason: None,
        }
    }

    fn fetched(id: &str, name: &str, releases: Vec<Release>) -> FetchedRepository {
        FetchedRepository {
            id: id.to_string(),
            name: name.to_string(),
            url: format!("https://github.com/{}", name),
            stars: 10,
            forks: 2,
            releases,
        }
    }

    fn tracker(source: StubSource, llm: ScriptedLlm) -> (Tracker, Arc<StubSource>, Arc<ScriptedLlm>) {
        let source = Arc::new(source);
        let llm = Arc::new(llm);
        let tracker = Tracker::new(
            source.clone(),
            llm.clone(),
            Storage::in_memory().unwrap(),
            2,
        );
        (tracker, source, llm)
    }

    #[tokio::test]
    async fn update_settings_keeps_the_prior_language_when_none_is_given() {
        let (tracker, _, _) = tracker(StubSource::empty(), ScriptedLlm::new(vec![]));

        tracker
            .update_settings("first description", Some("French".to_string()))
            .unwrap();
        let settings = tracker.update_settings("second description", None).unwrap();

        assert_eq!(settings.language, "French");
        assert_eq!(settings.project_description, "second description");
    }

    #[tokio::test]
    async fn add_without_settings_is_rejected_before_any_fetch() {
        let mut source = StubSource::empty();
        source.repository = Some(fetched("1", "a/b", vec![release("r1", "v1.0.0", 1, "notes")]));
        let (tracker, source, _) = tracker(source, ScriptedLlm::new(vec![]));

        let result = tracker
            .add_repository("https://github.com/a/b", "v1.0.0")
            .await;

        assert!(matches!(result, Err(Error::MissingProjectDescription)));
        assert_eq!(source.fetch_repository_calls.load(Ordering::SeqCst), 0);
        assert!(tracker.list_repositories().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_persists_the_fetched_release_window() {
        let mut source = StubSource::empty();
        source.repository = Some(fetched(
            "1",
            "a/b",
            vec![
                release("r2", "v1.1.0", 10, "new feature"),
                release("r1", "v1.0.0", 1, "initial"),
            ],
        ));
        let (tracker, _, _) = tracker(source, ScriptedLlm::new(vec![]));
        tracker.update_settings("my project", None).unwrap();

        let repository = tracker
            .add_repository("https://github.com/a/b", "v1.0.0")
            .await
            .unwrap();

        assert_eq!(repository.name, "a/b");
        assert_eq!(repository.releases.len(), 2);
        assert_eq!(repository.latest_version(), Some("v1.1.0"));
    }

    #[tokio::test]
    async fn refresh_skips_failing_repositories_and_counts_the_rest() {
        let mut source = StubSource::empty();
        source.failing.insert("a/broken".to_string());
        source.newer.insert(
            "c/healthy".to_string(),
            vec![
                release("h3", "v1.2.0", 20, "fix"),
                release("h2", "v1.1.0", 15, "feature"),
            ],
        );
        let (tracker, _, _) = tracker(source, ScriptedLlm::new(vec![]));

        tracker
            .storage
            .insert_repository(&fetched(
                "1",
                "a/broken",
                vec![release("b1", "v0.1.0", 1, "init")],
            ))
            .unwrap();
        tracker
            .storage
            .insert_repository(&fetched(
                "2",
                "c/healthy",
                vec![release("h1", "v1.0.0", 2, "init")],
            ))
            .unwrap();

        let summary = tracker.refresh_all().await.unwrap();

        assert_eq!(summary.new_releases, 2);
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.skipped, 1);

        let broken = tracker
            .storage
            .get_repository_by_name("a/broken")
            .unwrap()
            .unwrap();
        assert_eq!(broken.releases.len(), 1, "failed repo must stay untouched");

        let healthy = tracker
            .storage
            .get_repository_by_name("c/healthy")
            .unwrap()
            .unwrap();
        assert_eq!(healthy.releases.len(), 3);
        assert_eq!(healthy.latest_version(), Some("v1.2.0"));
    }

    #[tokio::test]
    async fn analyze_release_persists_and_prefers_the_override_description() {
        let llm = ScriptedLlm::new(vec![
            r#"{"summary": "adds retries", "impact_prediction": "low"}"#,
            r#"{"impact_level": "medium", "reason": "retry defaults change timing"}"#,
        ]);
        let (tracker, _, llm) = tracker(StubSource::empty(), llm);
        tracker.update_settings("GLOBAL description", None).unwrap();

        tracker
            .storage
            .insert_repository(&fetched(
                "1",
                "a/b",
                vec![release("r1", "v1.0.0", 1, "raw retry notes")],
            ))
            .unwrap();
        tracker
            .set_project_description("a/b", Some("OVERRIDE description"))
            .unwrap();

        let analysis = tracker.analyze_release("a/b", "v1.0.0").await.unwrap();
        assert_eq!(analysis.impact, ImpactLevel::Medium);

        let prompts = llm.prompts();
        assert!(prompts[1].contains("OVERRIDE description"));
        assert!(!prompts[1].contains("GLOBAL description"));

        let repository = tracker
            .storage
            .get_repository_by_name("a/b")
            .unwrap()
            .unwrap();
        let stored = &repository.releases[0];
        assert_eq!(stored.summary.as_deref(), Some("adds retries"));
        assert_eq!(stored.impact, Some(ImpactLevel::Medium));
    }

    #[tokio::test]
    async fn analyze_release_without_any_description_fails() {
        let (tracker, _, llm) = tracker(StubSource::empty(), ScriptedLlm::new(vec![]));
        tracker
            .storage
            .insert_repository(&fetched("1", "a/b", vec![release("r1", "v1.0.0", 1, "n")]))
            .unwrap();

        let result = tracker.analyze_release("a/b", "v1.0.0").await;
        assert!(matches!(result, Err(Error::MissingProjectDescription)));
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn analyze_overall_uses_raw_notes_oldest_first_and_persists() {
        let llm = ScriptedLlm::new(vec![
            r#"{"summary": "fixes then a breaking removal", "impact_level": "high", "reason": "the newest release removes an API"}"#,
        ]);
        let (tracker, _, llm) = tracker(StubSource::empty(), llm);
        tracker.update_settings("uses the old API", None).unwrap();

        tracker
            .storage
            .insert_repository(&fetched(
                "1",
                "a/b",
                vec![
                    release("r2", "v2.0.0", 20, "RAW breaking removal"),
                    release("r1", "v1.0.0", 1, "RAW only fixes"),
                ],
            ))
            .unwrap();
        // A prior per-release analysis must not leak into consolidation
        tracker
            .storage
            .update_release_analysis("r1", "STALE SUMMARY", ImpactLevel::Low, "old")
            .unwrap();

        let analysis = tracker.analyze_overall("a/b").await.unwrap();
        assert_eq!(analysis.impact, ImpactLevel::High);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("RAW only fixes"));
        assert!(prompts[0].contains("RAW breaking removal"));
        assert!(!prompts[0].contains("STALE SUMMARY"));
        assert!(
            prompts[0].find("RAW only fixes").unwrap()
                < prompts[0].find("RAW breaking removal").unwrap()
        );

        let repository = tracker
            .storage
            .get_repository_by_name("a/b")
            .unwrap()
            .unwrap();
        let overall = repository.overall_impact.unwrap();
        assert_eq!(overall.impact, ImpactLevel::High);
    }

    #[tokio::test]
    async fn remove_repository_deletes_it() {
        let (tracker, _, _) = tracker(StubSource::empty(), ScriptedLlm::new(vec![]));
        tracker
            .storage
            .insert_repository(&fetched("1", "a/b", vec![release("r1", "v1.0.0", 1, "n")]))
            .unwrap();

        tracker.remove_repository("a/b").unwrap();
        assert!(tracker.list_repositories().unwrap().is_empty());
        assert!(matches!(
            tracker.remove_repository("a/b"),
            Err(Error::RepoNotFound(_))
        ));
    }
}
