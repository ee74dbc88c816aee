mod client;
mod jenkins;

pub use client::CiClient;

use log::debug;

use crate::cache::ResultCache;
use crate::dispatch::JobIdentity;
use crate::error::Result;
use crate::models::{BuildRecord, FailureEntry, JobKind, Outcome};
use crate::output;

use jenkins::JenkinsBuild;

/// A build fetcher for one CI kind.
///
/// The three kinds share the Jenkins transport but differ in how the
/// triggering change is identified and what their reports carry; dispatch
/// is by kind, selected once at construction.
pub enum Fetcher<'a> {
    Pr(PrFetcher<'a>),
    Commit(CommitFetcher<'a>),
    Benchmark(BenchmarkFetcher<'a>),
}

impl<'a> Fetcher<'a> {
    pub fn for_identity(
        client: &'a CiClient,
        cache: &'a ResultCache,
        identity: JobIdentity,
    ) -> Self {
        match identity.kind {
            JobKind::Pr => Self::Pr(PrFetcher {
                client,
                cache,
                job_id: identity.job_id,
            }),
            JobKind::Commit => Self::Commit(CommitFetcher {
                client,
                cache,
                job_id: identity.job_id,
            }),
            JobKind::Benchmark => Self::Benchmark(BenchmarkFetcher {
                client,
                job_id: identity.job_id,
                significant: vec![],
            }),
        }
    }

    /// Retrieves the build and normalizes it into a record. May fail on
    /// network errors; those propagate without retry.
    pub async fn fetch_results(&mut self) -> Result<BuildRecord> {
        match self {
            Self::Pr(f) => f.fetch_results().await,
            Self::Commit(f) => f.fetch_results().await,
            Self::Benchmark(f) => f.fetch_results().await,
        }
    }

    /// Prints the per-job report to the operator's terminal.
    pub fn display(&self, record: &BuildRecord) {
        output::display_record(record, &self.job_url(record));
        if let Self::Benchmark(f) = self {
            output::display_benchmark_results(&f.significant);
        }
    }

    /// Markdown fragment for the accumulated clipboard report.
    pub fn markdown_fragment(&self, record: &BuildRecord) -> String {
        let mut fragment = output::markdown_fragment(record, &self.job_url(record));
        if let Self::Benchmark(f) = self {
            fragment.push_str(&output::markdown_benchmark_results(&f.significant));
        }
        fragment
    }

    /// Flattened JSON-serializable records for this job.
    pub fn json_records(&self, record: &BuildRecord) -> Vec<serde_json::Value> {
        let mut records = output::json_records(record, &self.job_url(record));
        if let Self::Benchmark(f) = self {
            for value in &mut records {
                value["significant_results"] = serde_json::json!(f.significant);
            }
        }
        records
    }

    fn job_url(&self, record: &BuildRecord) -> String {
        let client = match self {
            Self::Pr(f) => f.client,
            Self::Commit(f) => f.client,
            Self::Benchmark(f) => f.client,
        };
        client.job_url(record.kind, record.job_id)
    }
}

pub struct PrFetcher<'a> {
    client: &'a CiClient,
    cache: &'a ResultCache,
    job_id: u64,
}

impl PrFetcher<'_> {
    async fn fetch_results(&self) -> Result<BuildRecord> {
        fetch_multibuild(self.client, self.cache, JobKind::Pr, self.job_id, |build| {
            // A PR test run carries its PR number as a build parameter.
            build
                .parameter("PR_ID")
                .map(|id| format!("https://github.com/{}/pull/{}", self.client.repo_path(), id))
        })
        .await
    }
}

pub struct CommitFetcher<'a> {
    client: &'a CiClient,
    cache: &'a ResultCache,
    job_id: u64,
}

impl CommitFetcher<'_> {
    async fn fetch_results(&self) -> Result<BuildRecord> {
        fetch_multibuild(
            self.client,
            self.cache,
            JobKind::Commit,
            self.job_id,
            |build| {
                build
                    .parameter("COMMIT_SHA")
                    .or_else(|| build.parameter("GIT_REMOTE_REF"))
            },
        )
        .await
    }
}

pub struct BenchmarkFetcher<'a> {
    client: &'a CiClient,
    job_id: u64,
    /// Statistically significant comparison lines from the last fetch.
    significant: Vec<String>,
}

impl BenchmarkFetcher<'_> {
    // Benchmark runs are not served from the cache: the significance
    // report lives in the console text, which a cached record lacks.
    async fn fetch_results(&mut self) -> Result<BuildRecord> {
        let job_url = self.client.job_url(JobKind::Benchmark, self.job_id);
        let build = self.client.fetch_build(JobKind::Benchmark, self.job_id).await?;
        let console = self.client.fetch_console(&job_url).await?;

        self.significant = jenkins::significant_results(&console);

        let outcome = build.outcome();
        let failures = if outcome == Outcome::Failed {
            vec![jenkins::failure_from_console(
                &console,
                job_url.clone(),
                job_url,
                build.built_on.unwrap_or_else(|| "unknown".to_string()),
                JobKind::Benchmark,
            )]
        } else {
            vec![]
        };

        Ok(BuildRecord {
            kind: JobKind::Benchmark,
            job_id: self.job_id,
            outcome,
            failures,
        })
    }
}

/// Shared fetch path for the multibuild kinds (PR and commit).
///
/// Walks the failed sub-builds for failure entries; a failed build with no
/// failing sub-builds (a coordinator-level failure, typically checkout)
/// falls back to the build's own console.
async fn fetch_multibuild<F>(
    client: &CiClient,
    cache: &ResultCache,
    kind: JobKind,
    job_id: u64,
    source_of: F,
) -> Result<BuildRecord>
where
    F: FnOnce(&JenkinsBuild) -> Option<String>,
{
    if let Some(hit) = cache.get(kind, job_id) {
        debug!("Serving {kind} #{job_id} from cache");
        return Ok(hit);
    }

    let job_url = client.job_url(kind, job_id);
    let build = client.fetch_build(kind, job_id).await?;
    let source = source_of(&build).unwrap_or_else(|| job_url.clone());
    let outcome = build.outcome();

    let mut failures = Vec::new();
    if matches!(outcome, Outcome::Failed | Outcome::Unstable) {
        failures = collect_sub_failures(client, &build, &source, kind).await?;

        if failures.is_empty() && outcome == Outcome::Failed {
            let console = client.fetch_console(&job_url).await?;
            failures.push(jenkins::failure_from_console(
                &console,
                source,
                job_url,
                build.built_on.unwrap_or_else(|| "unknown".to_string()),
                kind,
            ));
        }
    }

    Ok(BuildRecord {
        kind,
        job_id,
        outcome,
        failures,
    })
}

async fn collect_sub_failures(
    client: &CiClient,
    build: &JenkinsBuild,
    source: &str,
    kind: JobKind,
) -> Result<Vec<FailureEntry>> {
    let mut failures = Vec::new();

    for sub in &build.sub_builds {
        if sub.outcome() != Outcome::Failed {
            continue;
        }

        let sub_url = client.absolute_url(&sub.url);
        debug!("Collecting failure from {} #{}", sub.job_name, sub.build_number);

        let sub_build = client.fetch_build_at(&sub_url).await?;
        let console = client.fetch_console(&sub_url).await?;

        failures.push(jenkins::failure_from_console(
            &console,
            source.to_string(),
            sub_url,
            sub_build.built_on.unwrap_or_else(|| "unknown".to_string()),
            kind,
        ));
    }

    Ok(failures)
}
