use crate::error::{DebtError, Result};
use crate::model::{RawCommit, RawRepository, SCHEMA_VERSION};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_CACHE_DIR: &str = ".debtscope";

pub struct Cache {
    conn: Connection,
    path: PathBuf,
}

impl Cache {
    pub fn new<CP: AsRef<Path>>(cache_path: Option<CP>) -> Result<Self> {
        let cache_dir = match cache_path {
            Some(path) => path.as_ref().to_path_buf(),
            None => PathBuf::from(DEFAULT_CACHE_DIR),
        };
        std::fs::create_dir_all(&cache_dir)?;
        let db_path = cache_dir.join("cache.db");
        let conn = Connection::open(&db_path)?;
        let mut cache = Self { conn, path: db_path };
        cache.initialize()?;
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS repositories (
                full_name TEXT PRIMARY KEY,
                created_at TEXT,
                stars INTEGER,
                open_issues INTEGER,
                forks INTEGER,
                language TEXT,
                closed_issues INTEGER,
                total_issues INTEGER,
                contributors INTEGER,
                fetched_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS commit_windows (
                repository TEXT PRIMARY KEY,
                commit_count INTEGER NOT NULL,
                fetched_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS commits (
                repository TEXT NOT NULL,
                position INTEGER NOT NULL,
                sha TEXT,
                message TEXT,
                timestamp TEXT,
                PRIMARY KEY (repository, position),
                FOREIGN KEY (repository) REFERENCES commit_windows(repository)
            );
            CREATE INDEX IF NOT EXISTS idx_repositories_stars ON repositories(stars);
            ",
        )?;
        self.check_schema_version()?;
        Ok(())
    }

    fn check_schema_version(&mut self) -> Result<()> {
        let user_version: i64 = self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?;

        if user_version == 0 {
            let set_stmt = format!("PRAGMA user_version = {SCHEMA_VERSION};");
            self.conn.execute_batch(&set_stmt)?;
        } else if user_version != SCHEMA_VERSION as i64 {
            return Err(DebtError::Cache(format!(
                "Schema version mismatch: expected {}, found {}",
                SCHEMA_VERSION, user_version
            )));
        }

        Ok(())
    }

    pub fn store_repositories(&mut self, repos: &[RawRepository]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().timestamp();
        let mut stored = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO repositories
                 (full_name, created_at, stars, open_issues, forks, language,
                  closed_issues, total_issues, contributors, fetched_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for repo in repos {
                let Some(full_name) = repo.full_name.as_deref() else {
                    continue;
                };
                stmt.execute(params![
                    full_name,
                    repo.created_at,
                    repo.stars.map(to_sql_int),
                    repo.open_issues.map(to_sql_int),
                    repo.forks.map(to_sql_int),
                    repo.language,
                    repo.closed_issues.map(to_sql_int),
                    repo.total_issues.map(to_sql_int),
                    repo.contributors.map(to_sql_int),
                    now
                ])?;
                stored += 1;
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    pub fn get_repositories(&self) -> Result<Vec<RawRepository>> {
        let mut stmt = self.conn.prepare(
            "SELECT full_name, created_at, stars, open_issues, forks, language,
                    closed_issues, total_issues, contributors
             FROM repositories ORDER BY full_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RawRepository {
                full_name: row.get(0)?,
                created_at: row.get(1)?,
                stars: from_sql_int(row.get(2)?),
                open_issues: from_sql_int(row.get(3)?),
                forks: from_sql_int(row.get(4)?),
                language: row.get(5)?,
                closed_issues: from_sql_int(row.get(6)?),
                total_issues: from_sql_int(row.get(7)?),
                contributors: from_sql_int(row.get(8)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Replaces the stored commit window for `repository`, newest first.
    pub fn store_commits(&mut self, repository: &str, commits: &[RawCommit]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM commits WHERE repository = ?", params![repository])?;
        tx.execute(
            "INSERT OR REPLACE INTO commit_windows (repository, commit_count, fetched_at)
             VALUES (?, ?, ?)",
            params![repository, commits.len() as i64, Utc::now().timestamp()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO commits (repository, position, sha, message, timestamp)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for (position, commit) in commits.iter().enumerate() {
                stmt.execute(params![
                    repository,
                    position as i64,
                    commit.sha,
                    commit.message,
                    commit.timestamp
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// `None` when the repository's history was never fetched.
    pub fn get_commits(&self, repository: &str) -> Result<Option<Vec<RawCommit>>> {
        let sampled: Option<i64> = self
            .conn
            .query_row(
                "SELECT commit_count FROM commit_windows WHERE repository = ?",
                params![repository],
                |row| row.get(0),
            )
            .optional()?;
        if sampled.is_none() {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT sha, message, timestamp FROM commits
             WHERE repository = ? ORDER BY position",
        )?;
        let rows = stmt.query_map(params![repository], |row| {
            Ok(RawCommit {
                repository: repository.to_string(),
                sha: row.get(0)?,
                message: row.get(1)?,
                timestamp: row.get(2)?,
            })
        })?;
        Ok(Some(rows.collect::<rusqlite::Result<Vec<_>>>()?))
    }

    pub fn sampled_repositories(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT repository FROM commit_windows")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(names)
    }

    pub fn latest_fetch(&self) -> Result<Option<DateTime<Utc>>> {
        let secs: Option<i64> = self
            .conn
            .query_row("SELECT MAX(fetched_at) FROM repositories", [], |row| row.get(0))?;
        Ok(secs.and_then(|s| DateTime::from_timestamp(s, 0)))
    }

    pub fn load_samples(&self) -> Result<Vec<(RawRepository, Option<Vec<RawCommit>>)>> {
        let mut samples = Vec::new();
        for repo in self.get_repositories()? {
            let commits = match repo.full_name.as_deref() {
                Some(name) => self.get_commits(name)?,
                None => None,
            };
            samples.push((repo, commits));
        }
        Ok(samples)
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn repo(name: &str) -> RawRepository {
        RawRepository {
            full_name: Some(name.to_string()),
            created_at: Some("2021-05-01T00:00:00Z".to_string()),
            stars: Some(1500),
            open_issues: Some(12),
            forks: Some(3),
            language: Some("Go".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn repositories_round_trip() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::new(Some(dir.path())).unwrap();

        let mut missing_date = repo("b/broken");
        missing_date.created_at = None;
        let stored = cache
            .store_repositories(&[repo("a/one"), missing_date.clone()])
            .unwrap();
        assert_eq!(stored, 2);

        let loaded = cache.get_repositories().unwrap();
        assert_eq!(loaded, vec![repo("a/one"), missing_date]);
    }

    #[test]
    fn commit_windows_distinguish_empty_from_unfetched() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::new(Some(dir.path())).unwrap();
        cache.store_repositories(&[repo("a/one"), repo("a/two")]).unwrap();

        assert_eq!(cache.get_commits("a/one").unwrap(), None);

        cache.store_commits("a/two", &[]).unwrap();
        assert_eq!(cache.get_commits("a/two").unwrap(), Some(vec![]));

        let commits = vec![
            RawCommit {
                repository: "a/one".into(),
                sha: Some("ff".into()),
                message: Some("fix: newest".into()),
                timestamp: Some("2024-02-01T00:00:00Z".into()),
            },
            RawCommit {
                repository: "a/one".into(),
                sha: Some("ee".into()),
                message: None,
                timestamp: Some("2024-01-01T00:00:00Z".into()),
            },
        ];
        cache.store_commits("a/one", &commits).unwrap();
        assert_eq!(cache.get_commits("a/one").unwrap(), Some(commits));

        let sampled = cache.sampled_repositories().unwrap();
        assert!(sampled.contains("a/one") && sampled.contains("a/two"));
        assert_eq!(cache.load_samples().unwrap().len(), 2);
    }

    #[test]
    fn latest_fetch_tracks_repository_writes() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::new(Some(dir.path())).unwrap();
        assert_eq!(cache.latest_fetch().unwrap(), None);

        let before = Utc::now().timestamp();
        cache.store_repositories(&[repo("a/one")]).unwrap();
        let fetched = cache.latest_fetch().unwrap().expect("fetch time recorded");
        assert!(fetched.timestamp() >= before);
        assert!(fetched <= Utc::now());

        cache
            .conn
            .execute("UPDATE repositories SET fetched_at = 0", [])
            .unwrap();
        assert_eq!(cache.latest_fetch().unwrap(), DateTime::from_timestamp(0, 0));
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = tempdir().unwrap();
        {
            let mut cache = Cache::new(Some(dir.path())).unwrap();
            cache.store_repositories(&[repo("a/one")]).unwrap();
        }
        let cache = Cache::new(Some(dir.path())).unwrap();
        assert_eq!(cache.get_repositories().unwrap().len(), 1);
    }

    #[test]
    fn schema_mismatch_is_reported() {
        let dir = tempdir().unwrap();
        {
            let conn = Connection::open(dir.path().join("cache.db")).unwrap();
            conn.execute_batch("PRAGMA user_version = 99;").unwrap();
        }
        assert!(matches!(
            Cache::new(Some(dir.path())),
            Err(DebtError::Cache(_))
        ));
    }
}
