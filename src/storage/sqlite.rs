use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;

use crate::error::Result;
use crate::models::{
    FetchedRepository, ImpactLevel, OverallImpact, ProjectSettings, Release, Repository,
};

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    fn init_db(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                url TEXT NOT NULL,
                stars INTEGER NOT NULL,
                forks INTEGER NOT NULL,
                project_description TEXT,
                overall_summary TEXT,
                overall_impact TEXT,
                overall_reason TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS releases (
                id TEXT PRIMARY KEY,
                repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
                version TEXT NOT NULL,
                published_at TEXT NOT NULL,
                raw_notes TEXT NOT NULL,
                summary TEXT,
                impact TEXT,
                reason TEXT
            );

            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                project_description TEXT NOT NULL,
                language TEXT NOT NULL DEFAULT 'English'
            );

            CREATE INDEX IF NOT EXISTS idx_releases_repository_id ON releases(repository_id);
            "#,
        )?;

        Ok(())
    }

    /// Inserts a repository and its release window in one transaction.
    pub fn insert_repository(&self, fetched: &FetchedRepository) -> Result<Repository> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO repositories (id, name, url, stars, forks, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                url = excluded.url,
                stars = excluded.stars,
                forks = excluded.forks
            "#,
            params![
                fetched.id,
                fetched.name,
                fetched.url,
                fetched.stars,
                fetched.forks,
                Utc::now().to_rfc3339(),
            ],
        )?;

        for release in &fetched.releases {
            insert_release(&tx, &fetched.id, release)?;
        }

        tx.commit()?;

        self.get_repository_by_id(&fetched.id)?
            .ok_or_else(|| crate::error::Error::RepoNotFound(fetched.name.clone()))
    }

    pub fn get_all_repositories(&self) -> Result<Vec<Repository>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, url, stars, forks, project_description,
                    overall_summary, overall_impact, overall_reason
             FROM repositories ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], row_to_repository)?;
        let mut repositories = Vec::new();
        for row in rows {
            let mut repository = row?;
            repository.releases = self.get_releases(&repository.id)?;
            repositories.push(repository);
        }

        Ok(repositories)
    }

    pub fn get_repository_by_name(&self, name: &str) -> Result<Option<Repository>> {
        self.get_repository_where("name = ?1", name)
    }

    pub fn get_repository_by_id(&self, id: &str) -> Result<Option<Repository>> {
        self.get_repository_where("id = ?1", id)
    }

    fn get_repository_where(&self, predicate: &str, value: &str) -> Result<Option<Repository>> {
        let sql = format!(
            "SELECT id, name, url, stars, forks, project_description,
                    overall_summary, overall_impact, overall_reason
             FROM repositories WHERE {}",
            predicate
        );

        let repository = self
            .conn
            .query_row(&sql, params![value], row_to_repository)
            .optional()?;

        match repository {
            Some(mut repository) => {
                repository.releases = self.get_releases(&repository.id)?;
                Ok(Some(repository))
            }
            None => Ok(None),
        }
    }

    /// Releases are deleted with their repository via the cascading FK.
    pub fn delete_repository(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn set_project_description(&self, id: &str, description: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE repositories SET project_description = ?1 WHERE id = ?2",
            params![description, id],
        )?;
        Ok(())
    }

    /// Appends newly discovered releases in one transaction. Upstream ids are
    /// stable, so a release already present is left untouched; returns the
    /// number actually inserted.
    pub fn add_releases(&self, repository_id: &str, releases: &[Release]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let mut inserted = 0;
        for release in releases {
            inserted += insert_release(&tx, repository_id, release)?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn get_releases(&self, repository_id: &str) -> Result<Vec<Release>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, version, published_at, raw_notes, summary, impact, reason
             FROM releases WHERE repository_id = ?1
             ORDER BY published_at DESC",
        )?;

        let releases = stmt.query_map(params![repository_id], |row| {
            let published_at: String = row.get(2)?;
            let impact: Option<String> = row.get(5)?;

            Ok(Release {
                id: row.get(0)?,
                version: row.get(1)?,
                published_at: chrono::DateTime::parse_from_rfc3339(&published_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                raw_notes: row.get(3)?,
                summary: row.get(4)?,
                impact: impact.and_then(|s| ImpactLevel::from_str(&s).ok()),
                reason: row.get(6)?,
            })
        })?;

        releases
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn update_release_analysis(
        &self,
        release_id: &str,
        summary: &str,
        impact: ImpactLevel,
        reason: &str,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE releases SET summary = ?1, impact = ?2, reason = ?3 WHERE id = ?4",
            params![summary, impact.as_str(), reason, release_id],
        )?;
        Ok(())
    }

    pub fn update_overall_impact(&self, repository_id: &str, overall: &OverallImpact) -> Result<()> {
        self.conn.execute(
            "UPDATE repositories
             SET overall_summary = ?1, overall_impact = ?2, overall_reason = ?3
             WHERE id = ?4",
            params![
                overall.summary,
                overall.impact.as_str(),
                overall.reason,
                repository_id
            ],
        )?;
        Ok(())
    }

    pub fn get_settings(&self) -> Result<Option<ProjectSettings>> {
        self.conn
            .query_row(
                "SELECT project_description, language FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(ProjectSettings {
                        project_description: row.get(0)?,
                        language: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Upsert by fixed key keeps the singleton invariant without a
    /// delete-then-insert window.
    pub fn upsert_settings(&self, settings: &ProjectSettings) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO settings (id, project_description, language)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                project_description = excluded.project_description,
                language = excluded.language
            "#,
            params![settings.project_description, settings.language],
        )?;
        Ok(())
    }

    #[cfg(test)]
    fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(Into::into)
    }
}

fn insert_release(
    conn: &Connection,
    repository_id: &str,
    release: &Release,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO releases (id, repository_id, version, published_at, raw_notes, summary, impact, reason)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(id) DO NOTHING
        "#,
        params![
            release.id,
            repository_id,
            release.version,
            release.published_at.to_rfc3339(),
            release.raw_notes,
            release.summary,
            release.impact.map(|i| i.as_str()),
            release.reason,
        ],
    )
}

fn row_to_repository(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repository> {
    let overall_summary: Option<String> = row.get(6)?;
    let overall_impact: Option<String> = row.get(7)?;
    let overall_reason: Option<String> = row.get(8)?;

    let overall_impact = match (overall_summary, overall_impact, overall_reason) {
        (Some(summary), Some(impact), Some(reason)) => {
            ImpactLevel::from_str(&impact).ok().map(|impact| OverallImpact {
                summary,
                impact,
                reason,
            })
        }
        _ => None,
    };

    Ok(Repository {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        stars: row.get(3)?,
        forks: row.get(4)?,
        project_description: row.get(5)?,
        releases: Vec::new(),
        overall_impact,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn release(id: &str, version: &str, day: u32) -> Release {
        Release {
            id: id.to_string(),
            version: version.to_string(),
            published_at: chrono::Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            raw_notes: format!("notes for {}", version),
            summary: None,
            impact: None,
            reason: None,
        }
    }

    fn fetched_repo() -> FetchedRepository {
        FetchedRepository {
            id: "101".to_string(),
            name: "tokio-rs/tokio".to_string(),
            url: "https://github.com/tokio-rs/tokio".to_string(),
            stars: 25000,
            forks: 2300,
            // Deliberately out of order; reads must sort newest first
            releases: vec![
                release("r1", "v1.0.0", 1),
                release("r3", "v2.0.0", 20),
                release("r2", "v1.1.0", 10),
            ],
        }
    }

    #[test]
    fn releases_come_back_newest_first() {
        let storage = Storage::in_memory().unwrap();
        let repository = storage.insert_repository(&fetched_repo()).unwrap();

        let versions: Vec<_> = repository
            .releases
            .iter()
            .map(|r| r.version.as_str())
            .collect();
        assert_eq!(versions, vec!["v2.0.0", "v1.1.0", "v1.0.0"]);
        assert_eq!(repository.latest_version(), Some("v2.0.0"));
    }

    #[test]
    fn appended_releases_keep_descending_order_and_stable_ids() {
        let storage = Storage::in_memory().unwrap();
        let repository = storage.insert_repository(&fetched_repo()).unwrap();

        let inserted = storage
            .add_releases(&repository.id, &[release("r4", "v2.1.0", 25)])
            .unwrap();
        assert_eq!(inserted, 1);

        // Same upstream id again is a no-op, not a duplicate or regeneration
        let inserted = storage
            .add_releases(&repository.id, &[release("r4", "v2.1.0", 25)])
            .unwrap();
        assert_eq!(inserted, 0);

        let repository = storage
            .get_repository_by_name("tokio-rs/tokio")
            .unwrap()
            .unwrap();
        let versions: Vec<_> = repository
            .releases
            .iter()
            .map(|r| r.version.as_str())
            .collect();
        assert_eq!(versions, vec!["v2.1.0", "v2.0.0", "v1.1.0", "v1.0.0"]);
    }

    #[test]
    fn a_corrupt_stored_timestamp_surfaces_as_an_error() {
        let storage = Storage::in_memory().unwrap();
        let repository = storage.insert_repository(&fetched_repo()).unwrap();

        storage
            .conn
            .execute(
                "UPDATE releases SET published_at = 'not-a-timestamp' WHERE id = 'r2'",
                [],
            )
            .unwrap();

        let result = storage.get_repository_by_id(&repository.id);
        assert!(matches!(result, Err(crate::error::Error::Database(_))));
    }

    #[test]
    fn deleting_a_repository_cascades_to_its_releases() {
        let storage = Storage::in_memory().unwrap();
        let repository = storage.insert_repository(&fetched_repo()).unwrap();
        assert_eq!(storage.count_rows("releases").unwrap(), 3);

        storage.delete_repository(&repository.id).unwrap();
        assert_eq!(storage.count_rows("repositories").unwrap(), 0);
        assert_eq!(storage.count_rows("releases").unwrap(), 0);
    }

    #[test]
    fn release_analysis_fields_round_trip() {
        let storage = Storage::in_memory().unwrap();
        let repository = storage.insert_repository(&fetched_repo()).unwrap();

        storage
            .update_release_analysis("r3", "big rewrite", ImpactLevel::High, "API removed")
            .unwrap();

        let repository = storage.get_repository_by_id(&repository.id).unwrap().unwrap();
        let analyzed = repository.releases.iter().find(|r| r.id == "r3").unwrap();
        assert_eq!(analyzed.summary.as_deref(), Some("big rewrite"));
        assert_eq!(analyzed.impact, Some(ImpactLevel::High));
        assert_eq!(analyzed.reason.as_deref(), Some("API removed"));

        let untouched = repository.releases.iter().find(|r| r.id == "r1").unwrap();
        assert!(untouched.summary.is_none());
    }

    #[test]
    fn overall_impact_round_trips() {
        let storage = Storage::in_memory().unwrap();
        let repository = storage.insert_repository(&fetched_repo()).unwrap();
        assert!(repository.overall_impact.is_none());

        storage
            .update_overall_impact(
                &repository.id,
                &OverallImpact {
                    summary: "spans three releases".to_string(),
                    impact: ImpactLevel::Medium,
                    reason: "one deprecation".to_string(),
                },
            )
            .unwrap();

        let repository = storage.get_repository_by_id(&repository.id).unwrap().unwrap();
        let overall = repository.overall_impact.unwrap();
        assert_eq!(overall.impact, ImpactLevel::Medium);
        assert_eq!(overall.summary, "spans three releases");
    }

    #[test]
    fn settings_stay_a_single_row_across_updates() {
        let storage = Storage::in_memory().unwrap();
        assert!(storage.get_settings().unwrap().is_none());

        storage
            .upsert_settings(&ProjectSettings::new("an axum web service", None))
            .unwrap();
        storage
            .upsert_settings(&ProjectSettings::new(
                "an axum web service with sqlite",
                Some("French".to_string()),
            ))
            .unwrap();

        assert_eq!(storage.count_rows("settings").unwrap(), 1);
        let settings = storage.get_settings().unwrap().unwrap();
        assert_eq!(settings.project_description, "an axum web service with sqlite");
        assert_eq!(settings.language, "French");
    }

    #[test]
    fn per_repository_description_override_round_trips() {
        let storage = Storage::in_memory().unwrap();
        let repository = storage.insert_repository(&fetched_repo()).unwrap();
        assert!(repository.project_description.is_none());

        storage
            .set_project_description(&repository.id, Some("CLI built on tokio"))
            .unwrap();
        let repository = storage.get_repository_by_id(&repository.id).unwrap().unwrap();
        assert_eq!(
            repository.project_description.as_deref(),
            Some("CLI built on tokio")
        );

        storage.set_project_description(&repository.id, None).unwrap();
        let repository = storage.get_repository_by_id(&repository.id).unwrap().unwrap();
        assert!(repository.project_description.is_none());
    }
}
