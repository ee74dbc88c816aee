use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::error::{CiTriageError, Result};
use crate::models::{BuildRecord, JobKind, Outcome};

/// On-disk result cache for completed builds.
///
/// Completed build outcomes never change, so they can be served from disk
/// instead of re-scraping the CI. Uses a per-project cache file in the
/// platform cache directory (e.g. `~/.cache/citriage/owner-repo.json` on
/// Linux).
///
/// The cache is loaded into memory at startup and immutable afterwards; a
/// new cache is derived from the final record list once the queue
/// completes. It is an explicit object handed to the fetchers, never
/// ambient global state, so tests can construct fetchers with caching on
/// or off deterministically.
pub struct ResultCache {
    cache_file: PathBuf,
    records: HashMap<String, BuildRecord>,
    enabled: bool,
}

impl ResultCache {
    /// Creates a cache for the given project, loading any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache directory cannot be determined or
    /// created.
    pub fn new(repo_path: &str, enabled: bool) -> Result<Self> {
        if !enabled {
            debug!("Result cache disabled");
            return Ok(Self::disabled());
        }

        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| CiTriageError::Cache("No cache directory found".into()))?
            .join("citriage");
        fs::create_dir_all(&cache_dir)?;

        let cache_filename = repo_path.replace('/', "-") + ".json";
        Self::at_file(cache_dir.join(cache_filename))
    }

    /// Disabled cache: every lookup misses, persisting is a no-op.
    pub fn disabled() -> Self {
        Self {
            cache_file: PathBuf::new(),
            records: HashMap::new(),
            enabled: false,
        }
    }

    /// Builds an enabled cache backed by an explicit file. Used directly
    /// by tests; `new` goes through the platform cache directory.
    pub fn at_file(cache_file: PathBuf) -> Result<Self> {
        let records = if cache_file.exists() {
            fs::read_to_string(&cache_file)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .inspect(|_| debug!("Loaded cache from: {}", cache_file.display()))
                .unwrap_or_else(|| {
                    warn!("Failed to load cache, starting with empty cache");
                    HashMap::new()
                })
        } else {
            HashMap::new()
        };

        info!("Result cache enabled at: {}", cache_file.display());

        Ok(Self {
            cache_file,
            records,
            enabled: true,
        })
    }

    fn key(kind: JobKind, job_id: u64) -> String {
        format!("{kind}-{job_id}")
    }

    /// Looks up a cached build record. Misses when caching is disabled or
    /// the build has not been seen before.
    pub fn get(&self, kind: JobKind, job_id: u64) -> Option<BuildRecord> {
        if !self.enabled {
            return None;
        }

        self.records.get(&Self::key(kind, job_id)).map(|record| {
            debug!("Cache hit for {kind} #{job_id}");
            record.clone()
        })
    }

    /// Derives a new cache from the final record list and saves it.
    ///
    /// Pending builds are skipped: their outcome is not settled yet and
    /// caching it would freeze a stale answer.
    pub fn persist(&self, records: &[BuildRecord]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut merged = self.records.clone();
        for record in records {
            if record.outcome == Outcome::Pending {
                continue;
            }
            merged.insert(Self::key(record.kind, record.job_id), record.clone());
        }

        fs::write(&self.cache_file, serde_json::to_string(&merged)?)?;
        debug!("Persisted {} cached builds", merged.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(job_id: u64, outcome: Outcome) -> BuildRecord {
        BuildRecord {
            kind: JobKind::Pr,
            job_id,
            outcome,
            failures: vec![],
        }
    }

    #[test]
    fn disabled_cache_never_hits_and_never_writes() {
        let cache = ResultCache::disabled();
        assert!(cache.get(JobKind::Pr, 1).is_none());
        cache.persist(&[record(1, Outcome::Success)]).unwrap();
        assert!(cache.get(JobKind::Pr, 1).is_none());
    }

    #[test]
    fn completed_builds_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("acme-widget.json");

        let cache = ResultCache::at_file(file.clone()).unwrap();
        cache
            .persist(&[record(10, Outcome::Failed), record(11, Outcome::Success)])
            .unwrap();

        let reloaded = ResultCache::at_file(file).unwrap();
        assert_eq!(reloaded.get(JobKind::Pr, 10).unwrap().outcome, Outcome::Failed);
        assert_eq!(reloaded.get(JobKind::Pr, 11).unwrap().outcome, Outcome::Success);
        assert!(reloaded.get(JobKind::Commit, 10).is_none());
    }

    #[test]
    fn pending_builds_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("acme-widget.json");

        let cache = ResultCache::at_file(file.clone()).unwrap();
        cache.persist(&[record(20, Outcome::Pending)]).unwrap();

        let reloaded = ResultCache::at_file(file).unwrap();
        assert!(reloaded.get(JobKind::Pr, 20).is_none());
    }

    #[test]
    fn corrupt_cache_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("acme-widget.json");
        fs::write(&file, "not json").unwrap();

        let cache = ResultCache::at_file(file).unwrap();
        assert!(cache.get(JobKind::Pr, 1).is_none());
    }
}
