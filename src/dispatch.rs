use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::config::JobNames;
use crate::error::{CiTriageError, Result};
use crate::fetchers::CiClient;
use crate::models::JobKind;

/// One build to process, addressed by CI kind and job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobIdentity {
    pub kind: JobKind,
    pub job_id: u64,
}

fn job_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/job/([^/\s]+)/(\d+)").unwrap())
}

fn pr_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"github\.com/[^/\s]+/[^/\s]+/pull/(\d+)").unwrap())
}

/// Extracts a job identity from a direct CI job URL. Deterministic, no
/// network access. Returns `None` for URLs that do not name a known job.
pub fn parse_job_url(url: &str, jobs: &JobNames) -> Option<JobIdentity> {
    let parsed = url::Url::parse(url).ok()?;
    let caps = job_url_re().captures(parsed.path())?;
    let kind = jobs.kind_of(&caps[1])?;
    let job_id = caps[2].parse().ok()?;
    Some(JobIdentity { kind, job_id })
}

/// Extracts a PR number from a GitHub pull request URL.
pub fn parse_pr_url(url: &str) -> Option<u64> {
    pr_url_re()
        .captures(url)?
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
}

/// Resolves a free-form URL to the job identities it names.
///
/// Direct CI job URLs resolve locally to a single identity. PR URLs are
/// resolved through the source-hosting service into one identity per
/// discovered CI kind. Anything else is an `UnrecognizedTarget` error,
/// which the CLI reports with usage help rather than a stack trace.
pub async fn resolve_url(client: &CiClient, url: &str) -> Result<Vec<JobIdentity>> {
    if let Some(identity) = parse_job_url(url, client.job_names()) {
        debug!("Resolved direct job URL: {} #{}", identity.kind, identity.job_id);
        return Ok(vec![identity]);
    }

    if let Some(pr) = parse_pr_url(url) {
        debug!("Resolving CI runs for PR #{pr}");
        let ci_map = client.fetch_ci_map_for_pr(pr).await?;
        let identities: Vec<JobIdentity> = ci_map
            .into_iter()
            .flat_map(|(kind, job_ids)| {
                job_ids
                    .into_iter()
                    .map(move |job_id| JobIdentity { kind, job_id })
            })
            .collect();
        return Ok(identities);
    }

    Err(CiTriageError::UnrecognizedTarget(url.to_string()))
}
